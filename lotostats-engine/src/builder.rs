use log::{info, warn};

use lotostats_db::models::{DrawRecord, GameConfig};

use crate::aggregator::{Aggregator, FoldMode};
use crate::config::{EngineConfig, ValidationPolicy};
use crate::error::{EngineError, EngineResult};
use crate::snapshot::StatisticsSnapshot;

#[derive(Debug, Clone)]
pub struct FoldOutcome {
    pub snapshot: StatisticsSnapshot,
    pub folded: u32,
    /// Concours écartés en mode tolérant.
    pub skipped: Vec<u32>,
}

/// Replie chaque tirage une fois ; applique la politique de validation aux tirages invalides.
pub(crate) fn fold_draws(
    aggregator: &mut Aggregator<'_>,
    draws: &[DrawRecord],
    policy: ValidationPolicy,
) -> EngineResult<Vec<u32>> {
    let mut skipped = Vec::new();
    for draw in draws {
        match aggregator.fold(draw) {
            Ok(()) => {}
            Err(EngineError::MalformedDraw { contest, defect }) if policy == ValidationPolicy::Lenient => {
                warn!("Tirage {} ignoré : {}", contest, defect);
                skipped.push(contest);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(skipped)
}

/// Reconstruction complète à partir d'un historique trié par concours décroissant.
pub fn build(draws: &[DrawRecord], game: &GameConfig, config: &EngineConfig) -> EngineResult<FoldOutcome> {
    let mut aggregator = Aggregator::new(game, FoldMode::FullRebuild)?;
    let skipped = fold_draws(&mut aggregator, draws, config.policy)?;
    let folded = aggregator.folded();
    let snapshot = aggregator.finish(config.top_pairs);

    info!(
        "Reconstruction {} : {} tirages intégrés, {} ignorés, filigrane {:?}",
        game.name,
        folded,
        skipped.len(),
        snapshot.watermark
    );
    Ok(FoldOutcome {
        snapshot,
        folded,
        skipped,
    })
}
