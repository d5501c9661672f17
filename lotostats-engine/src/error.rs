use lotostats_db::models::{DrawDefect, GameDefect};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("tirage {contest} invalide : {defect}")]
    MalformedDraw { contest: u32, defect: DrawDefect },

    #[error("le concours {contest} est déjà couvert par l'instantané (filigrane {watermark})")]
    Overlap { contest: u32, watermark: u32 },

    #[error("concours manquants entre {watermark} et {next} : reconstruction complète requise")]
    Gap { watermark: u32, next: u32 },

    #[error("configuration incompatible avec l'instantané : {0}")]
    ConfigMismatch(String),

    #[error("jeu {game} mal configuré : {defect}")]
    InvalidGame { game: String, defect: GameDefect },
}

impl EngineError {
    /// Erreurs de réconciliation : l'instantané de base est inutilisable, il faut tout reconstruire.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            EngineError::Overlap { .. } | EngineError::Gap { .. } | EngineError::ConfigMismatch(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
