use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Un tirage historique. Créé une seule fois par la source, jamais modifié.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub contest: u32,
    #[serde(with = "padded")]
    pub numbers: Vec<u8>,
    pub date: NaiveDate,
    pub rolled_over: bool,
}

impl DrawRecord {
    pub fn sorted_numbers(&self) -> Vec<u8> {
        let mut sorted = self.numbers.clone();
        sorted.sort_unstable();
        sorted
    }

    /// Format externe : "05-12-19-33-44-58".
    pub fn numbers_label(&self) -> String {
        join_numbers(&self.sorted_numbers())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: String,
    pub pick_count: usize,
    pub min_number: u8,
    pub max_number: u8,
    /// Bornes supérieures croissantes des tranches de somme ; la dernière tranche est "> dernière borne".
    #[serde(default = "default_sum_bounds")]
    pub sum_bounds: Vec<u32>,
}

pub fn default_sum_bounds() -> Vec<u32> {
    vec![50, 100, 150, 200, 250]
}

impl GameConfig {
    pub fn new(name: &str, pick_count: usize, min_number: u8, max_number: u8) -> Self {
        Self {
            name: name.to_string(),
            pick_count,
            min_number,
            max_number,
            sum_bounds: default_sum_bounds(),
        }
    }

    pub fn megasena() -> Self {
        Self::new("megasena", 6, 1, 60)
    }

    pub fn lotofacil() -> Self {
        // 15 numéros sur 25 : les sommes se concentrent entre 170 et 230
        Self {
            sum_bounds: vec![170, 185, 200, 215, 230],
            ..Self::new("lotofacil", 15, 1, 25)
        }
    }

    pub fn quina() -> Self {
        Self::new("quina", 5, 1, 80)
    }

    pub fn euromillions() -> Self {
        Self::new("euromillions", 5, 1, 50)
    }

    pub fn presets() -> Vec<GameConfig> {
        vec![
            Self::megasena(),
            Self::lotofacil(),
            Self::quina(),
            Self::euromillions(),
        ]
    }

    pub fn pool_size(&self) -> usize {
        (self.max_number as usize + 1).saturating_sub(self.min_number as usize)
    }

    pub fn validate(&self) -> Result<(), GameDefect> {
        if self.min_number > self.max_number {
            return Err(GameDefect::EmptyRange {
                min: self.min_number,
                max: self.max_number,
            });
        }
        if self.pick_count == 0 || self.pick_count > MAX_PICK_COUNT {
            return Err(GameDefect::PickCount(self.pick_count));
        }
        if self.pick_count > self.pool_size() {
            return Err(GameDefect::PoolTooSmall {
                pick_count: self.pick_count,
                pool: self.pool_size(),
            });
        }
        if let Some(w) = self.sum_bounds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(GameDefect::UnsortedSumBounds { lower: w[0], upper: w[1] });
        }
        Ok(())
    }
}

/// Au-delà, le comptage des paires (k(k-1)/2 par tirage) n'est pas tenté.
pub const MAX_PICK_COUNT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameDefect {
    #[error("plage de numéros vide ({min}-{max})")]
    EmptyRange { min: u8, max: u8 },

    #[error("{0} numéros par tirage (attendu entre 1 et 20)")]
    PickCount(usize),

    #[error("{pick_count} numéros à tirer parmi {pool} seulement")]
    PoolTooSmall { pick_count: usize, pool: usize },

    #[error("bornes de somme non strictement croissantes ({lower} puis {upper})")]
    UnsortedSumBounds { lower: u32, upper: u32 },
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::megasena()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawDefect {
    #[error("{found} numéros au lieu de {expected}")]
    WrongCount { expected: usize, found: usize },

    #[error("numéro {number} hors limites ({min}-{max})")]
    OutOfRange { number: u8, min: u8, max: u8 },

    #[error("numéro en double : {0:02}")]
    Duplicate(u8),

    #[error("numéro de concours nul")]
    ZeroContest,

    #[error("concours non décroissant (précédent : {previous})")]
    OutOfOrder { previous: u32 },
}

pub fn validate_draw(draw: &DrawRecord, game: &GameConfig) -> Result<(), DrawDefect> {
    if draw.contest == 0 {
        return Err(DrawDefect::ZeroContest);
    }
    if draw.numbers.len() != game.pick_count {
        return Err(DrawDefect::WrongCount {
            expected: game.pick_count,
            found: draw.numbers.len(),
        });
    }
    for &n in &draw.numbers {
        if n < game.min_number || n > game.max_number {
            return Err(DrawDefect::OutOfRange {
                number: n,
                min: game.min_number,
                max: game.max_number,
            });
        }
    }
    for i in 0..draw.numbers.len() {
        for j in (i + 1)..draw.numbers.len() {
            if draw.numbers[i] == draw.numbers[j] {
                return Err(DrawDefect::Duplicate(draw.numbers[i]));
            }
        }
    }
    Ok(())
}

pub fn format_number(n: u8) -> String {
    format!("{:02}", n)
}

pub fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|&n| format_number(n))
        .collect::<Vec<_>>()
        .join("-")
}

/// Accepte "05-12-19", "5 12 19" ou "05,12,19".
pub fn parse_numbers(raw: &str) -> Result<Vec<u8>> {
    let numbers = raw
        .split(|c: char| c == '-' || c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u8>()
                .with_context(|| format!("Numéro invalide : '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;
    if numbers.is_empty() {
        bail!("Aucun numéro dans '{}'", raw);
    }
    Ok(numbers)
}

/// Sérialise les numéros en chaînes de deux caractères ("05"), comme le format source.
pub mod padded {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::format_number;

    pub fn serialize<S: Serializer>(numbers: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(numbers.iter().map(|&n| format_number(n)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                s.parse::<u8>()
                    .map_err(|_| D::Error::custom(format!("numéro invalide : '{}'", s)))
            })
            .collect()
    }
}
