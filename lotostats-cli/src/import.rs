use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use lotostats_db::rusqlite::Connection;
use std::path::Path;

use lotostats_db::db::insert_draw;
use lotostats_db::models::{parse_numbers, DrawRecord};

/// Ligne attendue : `concours;JJ/MM/AAAA;05-12-19-33-44-58;gagnants`.
fn parse_record(record: &csv::StringRecord) -> Result<DrawRecord> {
    let get = |idx: usize| -> Result<String> {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let raw_contest = get(0)?;
    let contest = raw_contest
        .parse::<u32>()
        .with_context(|| format!("Numéro de concours invalide : '{}'", raw_contest))?;
    let date = parse_date(&get(1)?)?;
    let numbers = parse_numbers(&get(2)?)?;

    // sans gagnant au premier rang, la cagnotte est reportée
    let winners_str = get(3).unwrap_or_default();
    let winners: u32 = if winners_str.is_empty() {
        0
    } else {
        winners_str
            .parse()
            .with_context(|| format!("Nombre de gagnants invalide : '{}'", winners_str))?
    };

    Ok(DrawRecord {
        contest,
        numbers,
        date,
        rolled_over: winners == 0,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        bail!("Format de date invalide: '{}'", raw);
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .with_context(|| format!("Date inexistante: '{}'", raw))
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
    /// Plus petit concours inséré : s'il est déjà couvert par l'instantané, celui-ci est périmé.
    pub lowest_inserted: Option<u32>,
}

pub fn import_csv(conn: &Connection, game: &str, path: &Path) -> Result<ImportResult> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    import_reader(conn, game, reader)
}

fn import_reader<R: std::io::Read>(conn: &Connection, game: &str, mut reader: csv::Reader<R>) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        match record_result {
            Ok(record) => {
                match parse_record(&record) {
                    Ok(draw) => {
                        match insert_draw(&tx, game, &draw) {
                            Ok(true) => {
                                result.inserted += 1;
                                result.lowest_inserted = Some(
                                    result.lowest_inserted.map_or(draw.contest, |low| low.min(draw.contest)),
                                );
                            }
                            Ok(false) => result.skipped += 1,
                            Err(e) => {
                                log::error!("Erreur insertion ligne {}: {}", result.total_records, e);
                                result.errors += 1;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("Erreur parsing ligne {}: {:#}", result.total_records, e);
                        result.errors += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("Erreur lecture ligne {}: {}", result.total_records, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotostats_db::db::{count_draws, fetch_history, migrate};

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("17/02/2026").unwrap(), NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        assert!(parse_date("2026-02-17").is_err());
        assert!(parse_date("31/02/2026").is_err());
    }

    #[test]
    fn test_import_reader() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let data = "concours;date;numeros;gagnants\n\
                    101;06/01/2024;01-12-19-34-44-60;0\n\
                    102;09/01/2024;05-06-20-33-45-59;2\n\
                    abc;09/01/2024;05-06-20-33-45-59;2\n\
                    103;13/01/2024;58 44 33 19 12 05;\n\
                    102;09/01/2024;05-06-20-33-45-59;2\n";
        let result = import_reader(&conn, "megasena", reader(data)).unwrap();
        assert_eq!(result.total_records, 5);
        assert_eq!(result.inserted, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.lowest_inserted, Some(101));
        assert_eq!(count_draws(&conn, "megasena").unwrap(), 3);

        let draws = fetch_history(&conn, "megasena").unwrap();
        assert_eq!(draws[0].contest, 103);
        assert!(draws[0].rolled_over);
        assert!(!draws[1].rolled_over);
        assert!(draws[2].rolled_over);
        assert_eq!(draws[0].numbers_label(), "05-12-19-33-44-58");
    }

    #[test]
    fn test_import_csv_from_file() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quina.csv");
        std::fs::write(&path, "concours;date;numeros;gagnants\n1;06/01/2024;03-17-42-55-80;1\n").unwrap();

        let result = import_csv(&conn, "quina", &path).unwrap();
        assert_eq!(result.inserted, 1);
        assert_eq!(count_draws(&conn, "quina").unwrap(), 1);
        assert!(import_csv(&conn, "quina", &dir.path().join("absent.csv")).is_err());
    }
}
