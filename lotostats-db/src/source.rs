use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::db;
use crate::models::DrawRecord;

/// Fournit l'historique ordonné d'un jeu (concours décroissants, dédoublonnés).
pub trait DrawSource {
    fn fetch_history(&self, game: &str) -> Result<Vec<DrawRecord>>;
    fn fetch_latest(&self, game: &str) -> Result<Option<DrawRecord>>;
    fn fetch_newer(&self, game: &str, watermark: u32) -> Result<Vec<DrawRecord>>;
}

/// Reçoit un instantané pour stockage ou diffusion.
pub trait ResultSink<T> {
    fn publish(&self, game: &str, value: &T) -> Result<()>;
}

impl DrawSource for Connection {
    fn fetch_history(&self, game: &str) -> Result<Vec<DrawRecord>> {
        db::fetch_history(self, game)
    }

    fn fetch_latest(&self, game: &str) -> Result<Option<DrawRecord>> {
        Ok(db::fetch_last_draws(self, game, 1)?.into_iter().next())
    }

    fn fetch_newer(&self, game: &str, watermark: u32) -> Result<Vec<DrawRecord>> {
        db::fetch_newer(self, game, watermark)
    }
}

impl<T: Serialize> ResultSink<T> for Connection {
    fn publish(&self, game: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        db::store_snapshot(self, game, chrono::Utc::now().timestamp(), &payload)
    }
}

pub fn load_published<T: DeserializeOwned>(conn: &Connection, game: &str) -> Result<Option<T>> {
    match db::load_snapshot(conn, game)? {
        Some(payload) => {
            let value = serde_json::from_str(&payload)
                .with_context(|| format!("Instantané illisible pour {}", game))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Artefact JSON statique, un fichier par publication.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize> ResultSink<T> for JsonFileSink {
    fn publish(&self, game: &str, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
            }
        }
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Impossible d'écrire {:?}", self.path))?;
        log::info!("Instantané {} exporté vers {:?}", game, self.path);
        Ok(())
    }
}
