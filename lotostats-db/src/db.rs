use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{join_numbers, parse_numbers, DrawRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    game          TEXT NOT NULL,
    contest       INTEGER NOT NULL,
    date          TEXT NOT NULL,
    numbers       TEXT NOT NULL,
    rolled_over   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (game, contest)
);
CREATE TABLE IF NOT EXISTS snapshots (
    game          TEXT PRIMARY KEY,
    published_at  INTEGER NOT NULL,
    payload       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS snapshot_cache (
    game          TEXT NOT NULL,
    class         TEXT NOT NULL,
    stored_at     INTEGER NOT NULL,
    payload       TEXT NOT NULL,
    PRIMARY KEY (game, class)
);
";

const DRAW_COLUMNS: &str = "contest, date, numbers, rolled_over";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lotostats.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn insert_draw(conn: &Connection, game: &str, draw: &DrawRecord) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (game, contest, date, numbers, rolled_over)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            game,
            draw.contest,
            draw.date.format("%Y-%m-%d").to_string(),
            join_numbers(&draw.numbers),
            draw.rolled_over,
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

type RawDraw = (u32, String, String, bool);

fn raw_to_draw((contest, date, numbers, rolled_over): RawDraw) -> Result<DrawRecord> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .with_context(|| format!("Date invalide pour le concours {}: '{}'", contest, date))?;
    let numbers = parse_numbers(&numbers)
        .with_context(|| format!("Numéros invalides pour le concours {}", contest))?;
    Ok(DrawRecord {
        contest,
        numbers,
        date,
        rolled_over,
    })
}

fn query_draws(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<DrawRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<Vec<RawDraw>, _>>()?;
    raws.into_iter().map(raw_to_draw).collect()
}

/// Historique complet, du concours le plus récent au plus ancien.
pub fn fetch_history(conn: &Connection, game: &str) -> Result<Vec<DrawRecord>> {
    query_draws(
        conn,
        &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE game = ?1 ORDER BY contest DESC"),
        [game],
    )
}

pub fn fetch_last_draws(conn: &Connection, game: &str, limit: u32) -> Result<Vec<DrawRecord>> {
    query_draws(
        conn,
        &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE game = ?1 ORDER BY contest DESC LIMIT ?2"),
        rusqlite::params![game, limit],
    )
}

/// Tirages strictement postérieurs au filigrane, ordre décroissant.
pub fn fetch_newer(conn: &Connection, game: &str, watermark: u32) -> Result<Vec<DrawRecord>> {
    query_draws(
        conn,
        &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE game = ?1 AND contest > ?2 ORDER BY contest DESC"),
        rusqlite::params![game, watermark],
    )
}

pub fn count_draws(conn: &Connection, game: &str) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM draws WHERE game = ?1",
        [game],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Jeux présents en base avec leur nombre de tirages.
pub fn list_games(conn: &Connection) -> Result<Vec<(String, u32)>> {
    let mut stmt = conn.prepare("SELECT game, COUNT(*) FROM draws GROUP BY game ORDER BY game")?;
    let games = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(games)
}

pub fn store_snapshot(conn: &Connection, game: &str, published_at: i64, payload: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshots (game, published_at, payload) VALUES (?1, ?2, ?3)
         ON CONFLICT(game) DO UPDATE SET published_at = excluded.published_at, payload = excluded.payload",
        rusqlite::params![game, published_at, payload],
    ).context("Échec de l'enregistrement de l'instantané")?;
    Ok(())
}

pub fn load_snapshot(conn: &Connection, game: &str) -> Result<Option<String>> {
    let payload = conn
        .query_row(
            "SELECT payload FROM snapshots WHERE game = ?1",
            [game],
            |row| row.get(0),
        )
        .optional()?;
    Ok(payload)
}

pub fn delete_snapshot(conn: &Connection, game: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM snapshots WHERE game = ?1", [game])?;
    Ok(changed > 0)
}

pub fn cache_put(conn: &Connection, game: &str, class: &str, stored_at: i64, payload: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshot_cache (game, class, stored_at, payload) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(game, class) DO UPDATE SET stored_at = excluded.stored_at, payload = excluded.payload",
        rusqlite::params![game, class, stored_at, payload],
    ).context("Échec de l'écriture du cache")?;
    Ok(())
}

pub fn cache_get(conn: &Connection, game: &str, class: &str) -> Result<Option<(i64, String)>> {
    let entry = conn
        .query_row(
            "SELECT stored_at, payload FROM snapshot_cache WHERE game = ?1 AND class = ?2",
            [game, class],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(entry)
}

pub fn cache_delete(conn: &Connection, game: &str, class: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM snapshot_cache WHERE game = ?1 AND class = ?2",
        [game, class],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_draw(contest: u32, numbers: &[u8]) -> DrawRecord {
        DrawRecord {
            contest,
            numbers: numbers.to_vec(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(contest as u64),
            rolled_over: contest % 2 == 0,
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = memory_db();
        assert_eq!(count_draws(&conn, "megasena").unwrap(), 0);

        insert_draw(&conn, "megasena", &test_draw(1, &[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(count_draws(&conn, "megasena").unwrap(), 1);
        assert_eq!(count_draws(&conn, "quina").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = memory_db();

        let inserted = insert_draw(&conn, "megasena", &test_draw(1, &[1, 2, 3, 4, 5, 6])).unwrap();
        assert!(inserted);
        let inserted = insert_draw(&conn, "megasena", &test_draw(1, &[1, 2, 3, 4, 5, 6])).unwrap();
        assert!(!inserted);
        assert_eq!(count_draws(&conn, "megasena").unwrap(), 1);
    }

    #[test]
    fn test_fetch_order_and_roundtrip() {
        let conn = memory_db();

        insert_draw(&conn, "megasena", &test_draw(101, &[44, 1, 12, 19, 34, 60])).unwrap();
        insert_draw(&conn, "megasena", &test_draw(103, &[5, 12, 19, 33, 44, 58])).unwrap();
        insert_draw(&conn, "megasena", &test_draw(102, &[5, 6, 20, 33, 45, 59])).unwrap();

        let draws = fetch_history(&conn, "megasena").unwrap();
        assert_eq!(draws.iter().map(|d| d.contest).collect::<Vec<_>>(), vec![103, 102, 101]);
        assert_eq!(draws[1], test_draw(102, &[5, 6, 20, 33, 45, 59]));
        assert!(draws[1].rolled_over);

        let last = fetch_last_draws(&conn, "megasena", 2).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].contest, 103);
    }

    #[test]
    fn test_fetch_newer() {
        let conn = memory_db();
        for contest in 1..=5 {
            insert_draw(&conn, "quina", &test_draw(contest, &[1, 2, 3, 4, 5])).unwrap();
        }
        let newer = fetch_newer(&conn, "quina", 3).unwrap();
        assert_eq!(newer.iter().map(|d| d.contest).collect::<Vec<_>>(), vec![5, 4]);
        assert!(fetch_newer(&conn, "quina", 5).unwrap().is_empty());
    }

    #[test]
    fn test_list_games() {
        let conn = memory_db();
        insert_draw(&conn, "quina", &test_draw(1, &[1, 2, 3, 4, 5])).unwrap();
        insert_draw(&conn, "megasena", &test_draw(1, &[1, 2, 3, 4, 5, 6])).unwrap();
        insert_draw(&conn, "megasena", &test_draw(2, &[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(
            list_games(&conn).unwrap(),
            vec![("megasena".to_string(), 2), ("quina".to_string(), 1)]
        );
    }

    #[test]
    fn test_snapshot_store_replaces() {
        let conn = memory_db();
        assert!(load_snapshot(&conn, "megasena").unwrap().is_none());
        store_snapshot(&conn, "megasena", 10, "{\"a\":1}").unwrap();
        store_snapshot(&conn, "megasena", 20, "{\"a\":2}").unwrap();
        assert_eq!(load_snapshot(&conn, "megasena").unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(delete_snapshot(&conn, "megasena").unwrap());
        assert!(load_snapshot(&conn, "megasena").unwrap().is_none());
    }

    #[test]
    fn test_cache_table() {
        let conn = memory_db();
        cache_put(&conn, "quina", "live", 100, "x").unwrap();
        assert_eq!(cache_get(&conn, "quina", "live").unwrap(), Some((100, "x".to_string())));
        assert!(cache_get(&conn, "quina", "historical").unwrap().is_none());
        cache_delete(&conn, "quina", "live").unwrap();
        assert!(cache_get(&conn, "quina", "live").unwrap().is_none());
    }
}
