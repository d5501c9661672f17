use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{RngExt, SeedableRng};

use lotostats_db::models::{DrawRecord, GameConfig};

pub fn draw(contest: u32, numbers: &[u8], rolled_over: bool) -> DrawRecord {
    DrawRecord {
        contest,
        numbers: numbers.to_vec(),
        date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap() + Days::new(contest as u64 * 3),
        rolled_over,
    }
}

/// Trois tirages Mega-Sena, du plus récent au plus ancien.
pub fn scenario() -> Vec<DrawRecord> {
    vec![
        draw(103, &[5, 12, 19, 33, 44, 58], true),
        draw(102, &[5, 6, 20, 33, 45, 59], false),
        draw(101, &[1, 12, 19, 34, 44, 60], true),
    ]
}

/// Historique déterministe de `n` concours consécutifs (1..=n), ordre décroissant.
pub fn history(n: u32, game: &GameConfig) -> Vec<DrawRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut draws: Vec<DrawRecord> = (1..=n)
        .map(|contest| {
            let numbers: Vec<u8> = index::sample(&mut rng, game.pool_size(), game.pick_count)
                .into_iter()
                .map(|i| game.min_number + i as u8)
                .collect();
            // séries de reports irrégulières
            let rolled_over = rng.random_range(0..3) != 0;
            draw(contest, &numbers, rolled_over)
        })
        .collect();
    draws.reverse();
    draws
}
