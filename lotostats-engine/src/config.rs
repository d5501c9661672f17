use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lotostats_db::cache::CacheTtl;
use lotostats_db::models::GameConfig;

/// Politique face à un tirage invalide : tout arrêter, ou l'ignorer en le journalisant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    Strict,
    #[default]
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub policy: ValidationPolicy,
    #[serde(default = "default_top_pairs")]
    pub top_pairs: usize,
}

fn default_top_pairs() -> usize {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: ValidationPolicy::default(),
            top_pairs: default_top_pairs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "GameConfig::presets")]
    pub games: Vec<GameConfig>,
    #[serde(default)]
    pub cache: CacheTtl,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            games: GameConfig::presets(),
            cache: CacheTtl::default(),
        }
    }
}

impl Settings {
    pub fn game(&self, name: &str) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.name == name)
    }
}

/// Fichier absent : réglages par défaut.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let settings: Settings = serde_json::from_str(&json)
        .with_context(|| format!("Réglages invalides dans {:?}", path))?;
    for game in &settings.games {
        game.validate()
            .with_context(|| format!("Jeu '{}' mal configuré dans {:?}", game.name, path))?;
    }
    Ok(settings)
}

pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}
