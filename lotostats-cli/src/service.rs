use anyhow::Result;
use log::{debug, info, warn};

use lotostats_db::cache::{CacheKey, DataClass, SnapshotCache};
use lotostats_db::db::delete_snapshot;
use lotostats_db::models::GameConfig;
use lotostats_db::rusqlite::Connection;
use lotostats_db::source::{load_published, DrawSource, ResultSink};
use lotostats_engine::{build, merge, EngineConfig, FoldOutcome, StatisticsSnapshot, ValidationPolicy};

/// Chemin chaud (cache puis fusion) et chemin froid (reconstruction) pour un jeu.
pub struct SnapshotService<'a> {
    conn: &'a Connection,
    cache: &'a dyn SnapshotCache<StatisticsSnapshot>,
    engine: EngineConfig,
}

impl<'a> SnapshotService<'a> {
    pub fn new(conn: &'a Connection, cache: &'a dyn SnapshotCache<StatisticsSnapshot>, engine: EngineConfig) -> Self {
        Self { conn, cache, engine }
    }

    /// Instantané le plus frais disponible : cache "vivant", sinon fusion.
    /// En mode strict, tout l'historique est revalidé par une reconstruction.
    pub fn current(&self, game: &GameConfig) -> Result<StatisticsSnapshot> {
        if self.engine.policy == ValidationPolicy::Strict {
            debug!("Mode strict pour {}, cache ignoré", game.name);
            return self.rebuild(game);
        }
        let key = CacheKey::new(&game.name, DataClass::LiveCounters);
        if let Some(snapshot) = self.cache.get(&key)? {
            debug!("Cache vivant utilisé pour {}", game.name);
            return Ok(snapshot);
        }
        debug!("Cache vivant absent pour {}", game.name);
        self.refresh(game)
    }

    /// Fusionne les nouveaux tirages dans l'instantané publié.
    /// Chevauchement, trou ou configuration divergente : reconstruction complète.
    pub fn refresh(&self, game: &GameConfig) -> Result<StatisticsSnapshot> {
        let Some(base) = load_published::<StatisticsSnapshot>(self.conn, &game.name)? else {
            info!("Aucun instantané publié pour {}, reconstruction", game.name);
            return self.rebuild(game);
        };

        let newer = self.conn.fetch_newer(&game.name, base.watermark.unwrap_or(0))?;
        let outcome = match merge(&base, &newer, game, &self.engine) {
            Ok(outcome) => outcome,
            Err(e) if e.requires_rebuild() => {
                warn!("Fusion impossible pour {} ({}), reconstruction complète", game.name, e);
                return self.rebuild(game);
            }
            Err(e) => return Err(e.into()),
        };

        if outcome.folded > 0 {
            self.publish(game, &outcome.snapshot)?;
        }
        self.cache.put(&CacheKey::new(&game.name, DataClass::LiveCounters), &outcome.snapshot)?;
        Ok(outcome.snapshot)
    }

    pub fn rebuild(&self, game: &GameConfig) -> Result<StatisticsSnapshot> {
        let history = self.conn.fetch_history(&game.name)?;
        let outcome = build(&history, game, &self.engine)?;
        self.store(game, &outcome)?;
        Ok(outcome.snapshot)
    }

    /// Instantané reconstruit intégralement, gardé longtemps en cache.
    pub fn historical(&self, game: &GameConfig) -> Result<StatisticsSnapshot> {
        let key = CacheKey::new(&game.name, DataClass::HistoricalSnapshot);
        if let Some(snapshot) = self.cache.get(&key)? {
            debug!("Cache historique utilisé pour {}", game.name);
            return Ok(snapshot);
        }
        self.rebuild(game)
    }

    /// Publie et met en cache un résultat calculé ailleurs (commande `all`).
    pub fn store(&self, game: &GameConfig, outcome: &FoldOutcome) -> Result<()> {
        if !outcome.skipped.is_empty() {
            warn!("{} : {} tirage(s) ignoré(s) {:?}", game.name, outcome.skipped.len(), outcome.skipped);
        }
        self.publish(game, &outcome.snapshot)?;
        for class in [DataClass::LiveCounters, DataClass::HistoricalSnapshot] {
            self.cache.put(&CacheKey::new(&game.name, class), &outcome.snapshot)?;
        }
        Ok(())
    }

    /// Oublie l'instantané publié et les entrées de cache du jeu.
    pub fn invalidate(&self, game: &str) -> Result<()> {
        self.cache.invalidate_game(game)?;
        if delete_snapshot(self.conn, game)? {
            info!("Instantané de {} supprimé", game);
        }
        Ok(())
    }

    fn publish(&self, game: &GameConfig, snapshot: &StatisticsSnapshot) -> Result<()> {
        ResultSink::<StatisticsSnapshot>::publish(self.conn, &game.name, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate, TimeZone, Utc};
    use lotostats_db::cache::{CacheTtl, MemoryCache};
    use lotostats_db::db::{insert_draw, migrate};
    use lotostats_db::models::DrawRecord;

    fn draw(contest: u32, numbers: &[u8]) -> DrawRecord {
        DrawRecord {
            contest,
            numbers: numbers.to_vec(),
            date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap() + Days::new(contest as u64 * 3),
            rolled_over: contest % 2 == 0,
        }
    }

    fn setup(draws: &[DrawRecord]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        for d in draws {
            insert_draw(&conn, "megasena", d).unwrap();
        }
        conn
    }

    fn normalized(mut snapshot: StatisticsSnapshot) -> StatisticsSnapshot {
        snapshot.generated_at = Utc.timestamp_opt(0, 0).unwrap();
        snapshot
    }

    fn initial() -> Vec<DrawRecord> {
        vec![
            draw(1, &[1, 12, 19, 34, 44, 60]),
            draw(2, &[5, 6, 20, 33, 45, 59]),
            draw(3, &[5, 12, 19, 33, 44, 58]),
        ]
    }

    #[test]
    fn test_refresh_without_snapshot_rebuilds() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let snapshot = service.refresh(&GameConfig::megasena()).unwrap();
        assert_eq!(snapshot.draw_count, 3);
        assert_eq!(snapshot.watermark, Some(3));
        let published: Option<StatisticsSnapshot> = load_published(&conn, "megasena").unwrap();
        assert!(published.is_some());
    }

    #[test]
    fn test_refresh_merges_newer_draws() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let game = GameConfig::megasena();
        service.rebuild(&game).unwrap();

        insert_draw(&conn, "megasena", &draw(4, &[2, 3, 19, 40, 51, 57])).unwrap();
        insert_draw(&conn, "megasena", &draw(5, &[7, 12, 29, 41, 50, 56])).unwrap();
        let merged = service.refresh(&game).unwrap();
        let rebuilt = service.rebuild(&game).unwrap();
        assert_eq!(merged.watermark, Some(5));
        assert_eq!(normalized(merged), normalized(rebuilt));
    }

    #[test]
    fn test_refresh_falls_back_on_gap() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let game = GameConfig::megasena();
        service.rebuild(&game).unwrap();

        insert_draw(&conn, "megasena", &draw(6, &[2, 3, 19, 40, 51, 57])).unwrap();
        let snapshot = service.refresh(&game).unwrap();
        assert_eq!(snapshot.draw_count, 4);
        assert_eq!(snapshot.watermark, Some(6));
        assert!(!snapshot.is_detail_stale());
    }

    #[test]
    fn test_current_prefers_live_cache() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let game = GameConfig::megasena();
        let first = service.current(&game).unwrap();

        insert_draw(&conn, "megasena", &draw(4, &[2, 3, 19, 40, 51, 57])).unwrap();
        let cached = service.current(&game).unwrap();
        assert_eq!(cached, first);

        service.invalidate("megasena").unwrap();
        let fresh = service.current(&game).unwrap();
        assert_eq!(fresh.draw_count, 4);
    }

    #[test]
    fn test_historical_uses_cache_after_rebuild() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let game = GameConfig::megasena();
        let rebuilt = service.rebuild(&game).unwrap();
        insert_draw(&conn, "megasena", &draw(4, &[2, 3, 19, 40, 51, 57])).unwrap();
        assert_eq!(service.historical(&game).unwrap(), rebuilt);
    }

    #[test]
    fn test_invalidate_removes_published_snapshot() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let service = SnapshotService::new(&conn, &cache, EngineConfig::default());
        service.rebuild(&GameConfig::megasena()).unwrap();
        service.invalidate("megasena").unwrap();
        let published: Option<StatisticsSnapshot> = load_published(&conn, "megasena").unwrap();
        assert!(published.is_none());
    }

    #[test]
    fn test_strict_current_bypasses_live_cache() {
        let conn = setup(&initial());
        let cache = MemoryCache::new(CacheTtl::default());
        let game = GameConfig::megasena();
        let lenient = SnapshotService::new(&conn, &cache, EngineConfig::default());
        let cached = lenient.current(&game).unwrap();

        insert_draw(&conn, "megasena", &draw(4, &[2, 2, 19, 40, 51, 57])).unwrap();
        assert_eq!(lenient.current(&game).unwrap(), cached);

        let strict = SnapshotService::new(
            &conn,
            &cache,
            EngineConfig {
                policy: ValidationPolicy::Strict,
                ..EngineConfig::default()
            },
        );
        let err = strict.current(&game).unwrap_err();
        let engine_err = err.downcast_ref::<lotostats_engine::EngineError>();
        assert!(matches!(
            engine_err,
            Some(lotostats_engine::EngineError::MalformedDraw { contest: 4, .. })
        ));
    }
}
