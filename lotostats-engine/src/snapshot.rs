use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotostats_db::models::padded;

use crate::classify::sum_bucket_labels;
use crate::counter::{NumberMap, NumberPair, OrderedCounter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvenOdd {
    pub even: u32,
    pub odd: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumBucket {
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub pair: NumberPair,
    pub count: u32,
}

/// Totaux bruts nécessaires pour fusionner un instantané sans tout recalculer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldTotals {
    pub total_occurrences: u64,
    pub total_sum: u64,
    /// Numéros communs entre chaque tirage et le tirage immédiatement plus ancien.
    pub shared_with_previous: u64,
    pub repeat_comparisons: u64,
    #[serde(with = "padded")]
    pub newest_numbers: Vec<u8>,
    #[serde(with = "padded")]
    pub oldest_numbers: Vec<u8>,
    pub oldest_contest: Option<u32>,
    /// Série de reports se terminant au tirage le plus récent.
    pub newest_rollover_run: u32,
    /// Série de reports commençant au tirage le plus ancien.
    pub oldest_rollover_run: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub game: String,
    pub generated_at: DateTime<Utc>,
    pub draw_count: u32,
    /// Concours le plus récent intégré.
    pub watermark: Option<u32>,
    /// Concours jusqu'auquel le détail (paires, positions, histogrammes, chronologie) est exact.
    pub detail_as_of: Option<u32>,
    pub frequency: NumberMap,
    pub pair_frequency: OrderedCounter<NumberPair>,
    pub even_odd: EvenOdd,
    pub prime_total: u32,
    pub sum_histogram: Vec<SumBucket>,
    pub quadrant_totals: [u32; 4],
    pub positional_frequency: Vec<NumberMap>,
    pub last_seen_contest: NumberMap,
    pub consecutive_pair_count: u32,
    pub accumulated_draw_count: u32,
    pub average_sum: f64,
    pub monthly_timeline: OrderedCounter<String>,
    pub average_repeat: f64,
    pub longest_rollover_streak: u32,
    pub top_pairs: Vec<PairCount>,
    pub totals: FoldTotals,
}

impl StatisticsSnapshot {
    pub fn empty(game: &str, pick_count: usize, sum_bounds: &[u32]) -> Self {
        Self {
            game: game.to_string(),
            generated_at: Utc::now(),
            draw_count: 0,
            watermark: None,
            detail_as_of: None,
            frequency: NumberMap::new(),
            pair_frequency: OrderedCounter::new(),
            even_odd: EvenOdd::default(),
            prime_total: 0,
            sum_histogram: sum_bucket_labels(sum_bounds)
                .into_iter()
                .map(|label| SumBucket { label, count: 0 })
                .collect(),
            quadrant_totals: [0; 4],
            positional_frequency: vec![NumberMap::new(); pick_count],
            last_seen_contest: NumberMap::new(),
            consecutive_pair_count: 0,
            accumulated_draw_count: 0,
            average_sum: 0.0,
            monthly_timeline: OrderedCounter::new(),
            average_repeat: 0.0,
            longest_rollover_streak: 0,
            top_pairs: Vec::new(),
            totals: FoldTotals::default(),
        }
    }

    /// Vrai quand le détail n'a pas suivi les derniers tirages fusionnés.
    pub fn is_detail_stale(&self) -> bool {
        self.draw_count > 0 && self.detail_as_of != self.watermark
    }

    /// Nombre de concours écoulés depuis la dernière sortie du numéro.
    pub fn delay(&self, number: u8) -> Option<u32> {
        let last = self.last_seen_contest.get(number)?;
        Some(self.watermark?.saturating_sub(last))
    }

    /// Part du numéro dans l'ensemble des numéros tirés, en pourcentage.
    pub fn percentage(&self, number: u8) -> f64 {
        if self.totals.total_occurrences == 0 {
            return 0.0;
        }
        self.frequency.count(number) as f64 * 100.0 / self.totals.total_occurrences as f64
    }

    /// Numéros les plus sortis ; à égalité, le plus petit numéro d'abord.
    pub fn hottest(&self, n: usize) -> Vec<(u8, u32)> {
        let mut ranked: Vec<(u8, u32)> = self.frequency.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Numéros en plus long retard, y compris ceux jamais sortis.
    pub fn coldest(&self, n: usize, min_number: u8, max_number: u8) -> Vec<(u8, Option<u32>)> {
        let mut ranked: Vec<(u8, Option<u32>)> = (min_number..=max_number)
            .map(|number| (number, self.delay(number)))
            .collect();
        // None (jamais sorti) passe devant tout retard connu
        ranked.sort_by(|a, b| match (a.1, b.1) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        });
        ranked.truncate(n);
        ranked
    }

    /// Copie allégée pour l'affichage chaud/froid : sans paires ni positions.
    /// Le détail restant est marqué comme figé.
    pub fn compact(&self) -> Self {
        Self {
            pair_frequency: OrderedCounter::new(),
            positional_frequency: Vec::new(),
            detail_as_of: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatisticsSnapshot {
        let mut snapshot = StatisticsSnapshot::empty("megasena", 6, &[50, 100, 150, 200, 250]);
        snapshot.draw_count = 3;
        snapshot.watermark = Some(103);
        snapshot.detail_as_of = Some(103);
        snapshot.frequency.set(5, 2);
        snapshot.frequency.set(12, 2);
        snapshot.frequency.set(60, 1);
        snapshot.last_seen_contest.set(5, 103);
        snapshot.last_seen_contest.set(12, 103);
        snapshot.last_seen_contest.set(60, 101);
        snapshot.totals.total_occurrences = 18;
        snapshot.pair_frequency.increment(NumberPair::new(5, 12));
        snapshot
    }

    #[test]
    fn test_empty_snapshot_shape() {
        let snapshot = StatisticsSnapshot::empty("quina", 5, &[100, 200]);
        assert_eq!(snapshot.sum_histogram.len(), 3);
        assert_eq!(snapshot.positional_frequency.len(), 5);
        assert!(!snapshot.is_detail_stale());
        assert_eq!(snapshot.percentage(1), 0.0);
    }

    #[test]
    fn test_delay() {
        let snapshot = sample();
        assert_eq!(snapshot.delay(5), Some(0));
        assert_eq!(snapshot.delay(60), Some(2));
        assert_eq!(snapshot.delay(7), None);
    }

    #[test]
    fn test_hottest_and_coldest() {
        let snapshot = sample();
        assert_eq!(snapshot.hottest(2), vec![(5, 2), (12, 2)]);
        let cold = snapshot.coldest(3, 1, 60);
        assert_eq!(cold[0], (1, None));
        let known: Vec<_> = snapshot.coldest(60, 1, 60).into_iter().filter(|(_, d)| d.is_some()).collect();
        assert_eq!(known[0], (60, Some(2)));
    }

    #[test]
    fn test_percentage() {
        let snapshot = sample();
        assert!((snapshot.percentage(5) - 100.0 * 2.0 / 18.0).abs() < 1e-10);
    }

    #[test]
    fn test_compact_marks_detail_stale() {
        let compact = sample().compact();
        assert!(compact.pair_frequency.is_empty());
        assert!(compact.positional_frequency.is_empty());
        assert!(compact.is_detail_stale());
        assert_eq!(compact.frequency, sample().frequency);
    }

    #[test]
    fn test_snapshot_json_roundtrip_keeps_padded_keys() {
        let snapshot = sample();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""frequency":{"05":2,"12":2,"60":1}"#), "{json}");
        assert!(json.contains(r#""pair_frequency":{"05-12":1}"#), "{json}");
        let restored: StatisticsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
