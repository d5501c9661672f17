//! Moteur de statistiques de tirages.
//!
//! [`builder::build`] replie un historique complet (concours décroissants) en
//! un [`snapshot::StatisticsSnapshot`] ; [`merge::merge`] y ajoute seulement
//! les tirages postérieurs au filigrane, avec le même pas de repli
//! ([`aggregator::Aggregator`]).

pub mod aggregator;
pub mod builder;
pub mod classify;
pub mod config;
pub mod counter;
pub mod error;
pub mod merge;
pub mod snapshot;

#[cfg(test)]
mod fixtures;

pub use aggregator::{Aggregator, FoldMode};
pub use builder::{build, FoldOutcome};
pub use config::{EngineConfig, Settings, ValidationPolicy};
pub use error::{EngineError, EngineResult};
pub use merge::merge;
pub use snapshot::StatisticsSnapshot;
