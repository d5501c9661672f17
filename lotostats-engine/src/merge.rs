use log::{info, warn};

use lotostats_db::models::{DrawRecord, GameConfig};

use crate::aggregator::{Aggregator, FoldMode};
use crate::builder::{fold_draws, FoldOutcome};
use crate::classify::sum_bucket_labels;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::snapshot::StatisticsSnapshot;

fn unchanged(base: &StatisticsSnapshot, skipped: Vec<u32>) -> FoldOutcome {
    FoldOutcome {
        snapshot: base.clone(),
        folded: 0,
        skipped,
    }
}

fn check_compatible(base: &StatisticsSnapshot, game: &GameConfig) -> EngineResult<()> {
    if base.game != game.name {
        return Err(EngineError::ConfigMismatch(format!(
            "instantané de {}, jeu demandé {}",
            base.game, game.name
        )));
    }
    let labels: Vec<&str> = base.sum_histogram.iter().map(|b| b.label.as_str()).collect();
    if labels != sum_bucket_labels(&game.sum_bounds) {
        return Err(EngineError::ConfigMismatch(format!(
            "tranches de somme {:?} différentes de la configuration {:?}",
            labels, game.sum_bounds
        )));
    }
    // une base vide ne contribue aucun détail
    if base.draw_count > 0 && !base.is_detail_stale() && base.positional_frequency.len() != game.pick_count {
        return Err(EngineError::ConfigMismatch(format!(
            "{} positions dans l'instantané, {} numéros par tirage",
            base.positional_frequency.len(),
            game.pick_count
        )));
    }
    Ok(())
}

/// Fusionne dans `base` les tirages postérieurs à son filigrane (ordre décroissant).
///
/// Le résultat est identique à une reconstruction complète sur l'historique
/// entier, sauf `generated_at`. Si la base ne porte pas le détail (instantané
/// compact), paires, positions, histogrammes et chronologie restent ceux de la
/// base et `detail_as_of` reste en retard sur le filigrane.
pub fn merge(
    base: &StatisticsSnapshot,
    newer: &[DrawRecord],
    game: &GameConfig,
    config: &EngineConfig,
) -> EngineResult<FoldOutcome> {
    if newer.is_empty() {
        return Ok(unchanged(base, Vec::new()));
    }
    check_compatible(base, game)?;

    if let Some(watermark) = base.watermark {
        if let Some(stale) = newer.iter().find(|d| d.contest <= watermark) {
            return Err(EngineError::Overlap {
                contest: stale.contest,
                watermark,
            });
        }
        let next = newer.iter().map(|d| d.contest).min().unwrap_or(watermark + 1);
        if next != watermark + 1 {
            return Err(EngineError::Gap { watermark, next });
        }
    }

    let mut aggregator = Aggregator::new(game, FoldMode::IncrementalFromSnapshot(base))?;
    let skipped = fold_draws(&mut aggregator, newer, config.policy)?;
    let folded = aggregator.folded();
    if folded == 0 {
        warn!("Aucun tirage valide à fusionner pour {}", game.name);
        return Ok(unchanged(base, skipped));
    }
    let snapshot = aggregator.finish(config.top_pairs);

    if snapshot.is_detail_stale() {
        warn!(
            "Fusion {} : détail figé au concours {:?}, filigrane {:?}",
            game.name, snapshot.detail_as_of, snapshot.watermark
        );
    }
    info!(
        "Fusion {} : {} tirages ajoutés, {} ignorés, filigrane {:?} -> {:?}",
        game.name,
        folded,
        skipped.len(),
        base.watermark,
        snapshot.watermark
    );
    Ok(FoldOutcome {
        snapshot,
        folded,
        skipped,
    })
}
