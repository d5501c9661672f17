//! Cache d'instantanés avec durée de vie déclarée par classe de données.
//!
//! Les compteurs "vivants" (fusionnés à chaque nouveau tirage) expirent vite ;
//! les instantanés historiques reconstruits intégralement restent valides
//! beaucoup plus longtemps. Le cache est injecté dans le service appelant,
//! jamais partagé globalement.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    LiveCounters,
    HistoricalSnapshot,
}

impl DataClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::LiveCounters => "live",
            DataClass::HistoricalSnapshot => "historical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtl {
    pub live_counters_secs: i64,
    pub historical_secs: i64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            live_counters_secs: 300,
            historical_secs: 86_400,
        }
    }
}

impl CacheTtl {
    pub fn for_class(&self, class: DataClass) -> i64 {
        match class {
            DataClass::LiveCounters => self.live_counters_secs,
            DataClass::HistoricalSnapshot => self.historical_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub game: String,
    pub class: DataClass,
}

impl CacheKey {
    pub fn new(game: &str, class: DataClass) -> Self {
        Self {
            game: game.to_string(),
            class,
        }
    }
}

pub fn is_fresh(stored_at: i64, now: i64, ttl_secs: i64) -> bool {
    now >= stored_at && now - stored_at < ttl_secs
}

pub trait SnapshotCache<T> {
    fn get(&self, key: &CacheKey) -> Result<Option<T>>;
    fn put(&self, key: &CacheKey, value: &T) -> Result<()>;
    fn invalidate(&self, key: &CacheKey) -> Result<()>;

    fn invalidate_game(&self, game: &str) -> Result<()> {
        self.invalidate(&CacheKey::new(game, DataClass::LiveCounters))?;
        self.invalidate(&CacheKey::new(game, DataClass::HistoricalSnapshot))
    }
}

/// Cache en mémoire, limité à la durée du processus.
pub struct MemoryCache<T> {
    ttl: CacheTtl,
    entries: Mutex<HashMap<CacheKey, (DateTime<Utc>, T)>>,
}

impl<T: Clone> MemoryCache<T> {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, (DateTime<Utc>, T)>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("Verrou du cache mémoire empoisonné"))
    }

    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<T>> {
        let entries = self.lock_entries()?;
        let Some((stored_at, value)) = entries.get(key) else {
            return Ok(None);
        };
        if is_fresh(stored_at.timestamp(), now.timestamp(), self.ttl.for_class(key.class)) {
            Ok(Some(value.clone()))
        } else {
            log::debug!("Cache expiré pour {} ({})", key.game, key.class.as_str());
            Ok(None)
        }
    }

    pub fn put_at(&self, key: &CacheKey, value: &T, now: DateTime<Utc>) -> Result<()> {
        self.lock_entries()?.insert(key.clone(), (now, value.clone()));
        Ok(())
    }
}

impl<T: Clone> SnapshotCache<T> for MemoryCache<T> {
    fn get(&self, key: &CacheKey) -> Result<Option<T>> {
        self.get_at(key, Utc::now())
    }

    fn put(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.put_at(key, value, Utc::now())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.lock_entries()?.remove(key);
        Ok(())
    }
}

/// Cache persistant dans la table `snapshot_cache`.
pub struct SqliteCache<'c> {
    conn: &'c Connection,
    ttl: CacheTtl,
}

impl<'c> SqliteCache<'c> {
    pub fn new(conn: &'c Connection, ttl: CacheTtl) -> Self {
        Self { conn, ttl }
    }

    pub fn get_at<T: DeserializeOwned>(&self, key: &CacheKey, now: i64) -> Result<Option<T>> {
        let Some((stored_at, payload)) = db::cache_get(self.conn, &key.game, key.class.as_str())? else {
            return Ok(None);
        };
        if !is_fresh(stored_at, now, self.ttl.for_class(key.class)) {
            log::debug!("Cache expiré pour {} ({})", key.game, key.class.as_str());
            return Ok(None);
        }
        let value = serde_json::from_str(&payload)
            .with_context(|| format!("Entrée de cache illisible pour {}", key.game))?;
        Ok(Some(value))
    }

    pub fn put_at<T: Serialize>(&self, key: &CacheKey, value: &T, now: i64) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        db::cache_put(self.conn, &key.game, key.class.as_str(), now, &payload)
    }
}

impl<T: Serialize + DeserializeOwned> SnapshotCache<T> for SqliteCache<'_> {
    fn get(&self, key: &CacheKey) -> Result<Option<T>> {
        self.get_at(key, Utc::now().timestamp())
    }

    fn put(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.put_at(key, value, Utc::now().timestamp())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        db::cache_delete(self.conn, &key.game, key.class.as_str())
    }
}
