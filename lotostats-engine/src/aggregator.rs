//! Pas de repli unique, partagé par la reconstruction complète et la fusion.
//!
//! Les tirages arrivent du plus récent au plus ancien. Chaque appel à
//! [`Aggregator::fold`] met à jour tous les compteurs une fois par numéro et
//! une fois par tirage. En mode incrémental, le segment replié ne contient que
//! des tirages plus récents que l'instantané de base ; [`Aggregator::finish`]
//! raccorde alors le segment à la base (ordre de première rencontre, séries de
//! reports, répétition au point de jonction).

use chrono::{Datelike, NaiveDate, Utc};

use lotostats_db::models::{validate_draw, DrawDefect, DrawRecord, GameConfig};

use crate::classify::{is_prime, quadrant_of, sum_bucket_of};
use crate::counter::NumberPair;
use crate::error::{EngineError, EngineResult};
use crate::snapshot::{PairCount, StatisticsSnapshot};

#[derive(Debug, Clone, Copy)]
pub enum FoldMode<'a> {
    FullRebuild,
    IncrementalFromSnapshot(&'a StatisticsSnapshot),
}

pub struct Aggregator<'a> {
    game: &'a GameConfig,
    mode: FoldMode<'a>,
    segment: StatisticsSnapshot,
    previous: Option<(u32, Vec<u8>)>,
    newest_run_open: bool,
    current_run: u32,
}

pub fn month_label(date: NaiveDate) -> String {
    format!("{:02}/{}", date.month(), date.year())
}

fn count_shared(a: &[u8], b: &[u8]) -> u64 {
    a.iter().filter(|n| b.contains(n)).count() as u64
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl<'a> Aggregator<'a> {
    /// Refuse une configuration de jeu incohérente avant tout repli.
    pub fn new(game: &'a GameConfig, mode: FoldMode<'a>) -> EngineResult<Self> {
        game.validate().map_err(|defect| EngineError::InvalidGame {
            game: game.name.clone(),
            defect,
        })?;
        Ok(Self {
            game,
            mode,
            segment: StatisticsSnapshot::empty(&game.name, game.pick_count, &game.sum_bounds),
            previous: None,
            newest_run_open: true,
            current_run: 0,
        })
    }

    /// Tirages intégrés au segment courant.
    pub fn folded(&self) -> u32 {
        self.segment.draw_count
    }

    /// Intègre un tirage. Un tirage rejeté ne modifie aucun compteur.
    pub fn fold(&mut self, draw: &DrawRecord) -> EngineResult<()> {
        let malformed = |defect: DrawDefect| EngineError::MalformedDraw {
            contest: draw.contest,
            defect,
        };
        validate_draw(draw, self.game).map_err(malformed)?;
        if let Some((previous, _)) = &self.previous {
            if draw.contest >= *previous {
                return Err(malformed(DrawDefect::OutOfOrder { previous: *previous }));
            }
        }
        if let FoldMode::IncrementalFromSnapshot(base) = self.mode {
            if let Some(watermark) = base.watermark {
                if draw.contest <= watermark {
                    return Err(EngineError::Overlap {
                        contest: draw.contest,
                        watermark,
                    });
                }
            }
        }

        self.absorb(draw);
        Ok(())
    }

    fn absorb(&mut self, draw: &DrawRecord) {
        let sorted = draw.sorted_numbers();
        let seg = &mut self.segment;

        seg.draw_count += 1;
        if seg.watermark.is_none() {
            seg.watermark = Some(draw.contest);
        }
        seg.totals.oldest_contest = Some(draw.contest);

        let sum: u32 = sorted.iter().map(|&n| n as u32).sum();
        seg.totals.total_sum += sum as u64;
        seg.sum_histogram[sum_bucket_of(sum, &self.game.sum_bounds)].count += 1;

        for (pos, &n) in sorted.iter().enumerate() {
            seg.frequency.increment(n);
            seg.totals.total_occurrences += 1;
            if n % 2 == 0 {
                seg.even_odd.even += 1;
            } else {
                seg.even_odd.odd += 1;
            }
            if is_prime(n as u32) {
                seg.prime_total += 1;
            }
            seg.quadrant_totals[quadrant_of(n)] += 1;
            seg.positional_frequency[pos].increment(n);
            // parcours décroissant : la première affectation est la plus récente
            seg.last_seen_contest.set_if_absent(n, draw.contest);
            if pos > 0 && sorted[pos - 1] + 1 == n {
                seg.consecutive_pair_count += 1;
            }
        }

        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                seg.pair_frequency.increment(NumberPair::new(sorted[i], sorted[j]));
            }
        }

        seg.monthly_timeline.increment(month_label(draw.date));

        match &self.previous {
            Some((_, newer_numbers)) => {
                seg.totals.shared_with_previous += count_shared(newer_numbers, &sorted);
                seg.totals.repeat_comparisons += 1;
            }
            None => seg.totals.newest_numbers = sorted.clone(),
        }
        seg.totals.oldest_numbers = sorted.clone();

        // séries de reports : la plus longue ne dépend pas du sens de lecture,
        // seules les séries aux deux extrémités servent au raccord
        if draw.rolled_over {
            seg.accumulated_draw_count += 1;
            self.current_run += 1;
            seg.longest_rollover_streak = seg.longest_rollover_streak.max(self.current_run);
        } else {
            self.current_run = 0;
        }
        if self.newest_run_open {
            if draw.rolled_over {
                seg.totals.newest_rollover_run += 1;
            } else {
                self.newest_run_open = false;
            }
        }
        seg.totals.oldest_rollover_run = self.current_run;

        self.previous = Some((draw.contest, sorted));
    }

    pub fn finish(self, top_pairs: usize) -> StatisticsSnapshot {
        let mut segment = self.segment;
        segment.generated_at = Utc::now();
        match self.mode {
            FoldMode::FullRebuild => {
                finalize(&mut segment, top_pairs);
                segment.detail_as_of = segment.watermark;
                segment
            }
            FoldMode::IncrementalFromSnapshot(base) => stitch(segment, base, top_pairs),
        }
    }
}

fn finalize(snapshot: &mut StatisticsSnapshot, top_pairs: usize) {
    let totals = &snapshot.totals;
    snapshot.average_sum = if snapshot.draw_count == 0 {
        0.0
    } else {
        totals.total_sum as f64 / snapshot.draw_count as f64
    };
    snapshot.average_repeat = if totals.repeat_comparisons == 0 {
        0.0
    } else {
        round_one_decimal(totals.shared_with_previous as f64 / totals.repeat_comparisons as f64)
    };
    snapshot.top_pairs = snapshot
        .pair_frequency
        .top(top_pairs)
        .into_iter()
        .map(|(pair, count)| PairCount { pair, count })
        .collect();
}

/// Raccorde un segment de tirages récents à un instantané plus ancien.
fn stitch(newer: StatisticsSnapshot, base: &StatisticsSnapshot, top_pairs: usize) -> StatisticsSnapshot {
    if base.draw_count == 0 {
        let mut merged = newer;
        finalize(&mut merged, top_pairs);
        merged.detail_as_of = merged.watermark;
        return merged;
    }
    if newer.draw_count == 0 {
        return base.clone();
    }

    let detail_complete = !base.is_detail_stale();
    let mut merged = base.clone();
    merged.generated_at = newer.generated_at;
    merged.draw_count = base.draw_count + newer.draw_count;
    merged.watermark = newer.watermark;

    merged.frequency.add(&newer.frequency);
    merged.even_odd.even += newer.even_odd.even;
    merged.even_odd.odd += newer.even_odd.odd;
    merged.last_seen_contest.overwrite_with(&newer.last_seen_contest);
    merged.accumulated_draw_count += newer.accumulated_draw_count;

    let (nt, bt) = (&newer.totals, &base.totals);
    merged.totals.total_occurrences = nt.total_occurrences + bt.total_occurrences;
    merged.totals.total_sum = nt.total_sum + bt.total_sum;
    merged.totals.shared_with_previous = nt.shared_with_previous
        + bt.shared_with_previous
        + count_shared(&bt.newest_numbers, &nt.oldest_numbers);
    merged.totals.repeat_comparisons = nt.repeat_comparisons + bt.repeat_comparisons + 1;
    merged.totals.newest_numbers = nt.newest_numbers.clone();

    merged.longest_rollover_streak = base
        .longest_rollover_streak
        .max(newer.longest_rollover_streak)
        .max(bt.newest_rollover_run + nt.oldest_rollover_run);
    merged.totals.newest_rollover_run = if nt.newest_rollover_run == newer.draw_count {
        newer.draw_count + bt.newest_rollover_run
    } else {
        nt.newest_rollover_run
    };
    merged.totals.oldest_rollover_run = if bt.oldest_rollover_run == base.draw_count {
        base.draw_count + nt.oldest_rollover_run
    } else {
        bt.oldest_rollover_run
    };

    if detail_complete {
        let mut pairs = newer.pair_frequency;
        pairs.append_older(&base.pair_frequency);
        merged.pair_frequency = pairs;

        let mut timeline = newer.monthly_timeline;
        timeline.append_older(&base.monthly_timeline);
        merged.monthly_timeline = timeline;

        for (slot, counts) in merged.positional_frequency.iter_mut().zip(&newer.positional_frequency) {
            slot.add(counts);
        }
        for (bucket, fresh) in merged.sum_histogram.iter_mut().zip(&newer.sum_histogram) {
            bucket.count += fresh.count;
        }
        for (total, fresh) in merged.quadrant_totals.iter_mut().zip(newer.quadrant_totals) {
            *total += fresh;
        }
        merged.prime_total += newer.prime_total;
        merged.consecutive_pair_count += newer.consecutive_pair_count;
    }

    let base_top_pairs = std::mem::take(&mut merged.top_pairs);
    finalize(&mut merged, top_pairs);
    if detail_complete {
        merged.detail_as_of = merged.watermark;
    } else {
        // le détail reste celui de la base, daté de son filigrane
        merged.top_pairs = base_top_pairs;
    }
    merged
}
