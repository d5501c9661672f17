use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};
use textplots::Plot;

use crate::import::ImportResult;
use lotostats_db::models::{format_number, DrawRecord, GameConfig};
use lotostats_engine::classify::QUADRANT_LABELS;
use lotostats_engine::StatisticsSnapshot;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn bar(count: u32, max: u32) -> String {
    if max == 0 {
        return String::new();
    }
    "█".repeat((count as f64 * 30.0 / max as f64).round() as usize)
}

pub fn display_draws(draws: &[DrawRecord]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Concours", "Date", "Numéros", "Cagnotte"]);
    for draw in draws {
        let numbers = draw
            .sorted_numbers()
            .iter()
            .map(|n| format_number(*n))
            .collect::<Vec<_>>()
            .join(" - ");
        let rollover = if draw.rolled_over { "Reportée" } else { "—" };

        table.add_row(vec![
            draw.contest.to_string(),
            draw.date.format("%d/%m/%Y").to_string(),
            numbers,
            rollover.to_string(),
        ]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

pub fn display_summary(snapshot: &StatisticsSnapshot) {
    let watermark = snapshot
        .watermark
        .map(|w| w.to_string())
        .unwrap_or_else(|| "—".to_string());
    println!("\n📊 {} : {} tirages (dernier concours {})\n", snapshot.game, snapshot.draw_count, watermark);
    println!("  Somme moyenne              : {:.2}", snapshot.average_sum);
    println!("  Répétitions moyennes       : {:.1}", snapshot.average_repeat);
    println!("  Paires consécutives        : {}", snapshot.consecutive_pair_count);
    println!("  Cagnottes reportées        : {}", snapshot.accumulated_draw_count);
    println!("  Plus longue série reportée : {}", snapshot.longest_rollover_streak);

    if snapshot.is_detail_stale() {
        let as_of = snapshot
            .detail_as_of
            .map(|c| c.to_string())
            .unwrap_or_else(|| "—".to_string());
        println!("\n⚠ Détail (paires, positions, histogrammes) figé au concours {as_of} ; lancez `rebuild`.");
    }
}

/// Fréquence, pourcentage et retard de chaque numéro ; chauds en vert, froids en rouge.
pub fn display_frequencies(snapshot: &StatisticsSnapshot, game: &GameConfig, highlight: usize) {
    println!("\n── Numéros ({}-{}) ──", game.min_number, game.max_number);

    let hot: Vec<u8> = snapshot.hottest(highlight).into_iter().map(|(n, _)| n).collect();
    let cold: Vec<u8> = snapshot
        .coldest(highlight, game.min_number, game.max_number)
        .into_iter()
        .map(|(n, _)| n)
        .collect();

    let mut rows: Vec<(u8, u32)> = (game.min_number..=game.max_number)
        .map(|n| (n, snapshot.frequency.count(n)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    let mut table = new_table(vec!["Numéro", "Fréquence", "%", "Retard"]);
    for (number, count) in rows {
        let delay = snapshot
            .delay(number)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "jamais sorti".to_string());
        let color = if hot.contains(&number) {
            Color::Green
        } else if cold.contains(&number) {
            Color::Red
        } else {
            Color::White
        };
        table.add_row(vec![
            Cell::new(format_number(number)).fg(color),
            Cell::new(count.to_string()),
            Cell::new(format!("{:.2}", snapshot.percentage(number))),
            Cell::new(delay),
        ]);
    }
    println!("{table}");
}

pub fn display_top_pairs(snapshot: &StatisticsSnapshot, top: usize) {
    println!("\n── Paires les plus fréquentes ──");
    if snapshot.top_pairs.is_empty() {
        println!("  (Aucune paire)");
        return;
    }

    let mut table = new_table(vec!["#", "Paire", "Sorties"]);
    for (i, pair) in snapshot.top_pairs.iter().take(top).enumerate() {
        table.add_row(vec![
            &format!("{}", i + 1),
            &pair.pair.to_string(),
            &pair.count.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_distribution(snapshot: &StatisticsSnapshot) {
    println!("\n── Sommes des tirages ──");
    let max = snapshot.sum_histogram.iter().map(|b| b.count).max().unwrap_or(0);
    let mut table = new_table(vec!["Tranche", "Tirages", ""]);
    for bucket in &snapshot.sum_histogram {
        table.add_row(vec![&bucket.label, &bucket.count.to_string(), &bar(bucket.count, max)]);
    }
    println!("{table}");

    println!("\n── Quadrants ──");
    let max = snapshot.quadrant_totals.iter().copied().max().unwrap_or(0);
    let mut table = new_table(vec!["Quadrant", "Numéros", ""]);
    for (label, count) in QUADRANT_LABELS.iter().zip(snapshot.quadrant_totals) {
        table.add_row(vec![*label, &count.to_string(), &bar(count, max)]);
    }
    println!("{table}");

    let total = snapshot.totals.total_occurrences;
    let share = |count: u32| {
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    };
    println!("\n── Parité et nombres premiers ──");
    let mut table = new_table(vec!["Catégorie", "Numéros", "%"]);
    table.add_row(vec!["Pairs", &snapshot.even_odd.even.to_string(), &format!("{:.1}", share(snapshot.even_odd.even))]);
    table.add_row(vec!["Impairs", &snapshot.even_odd.odd.to_string(), &format!("{:.1}", share(snapshot.even_odd.odd))]);
    table.add_row(vec!["Premiers", &snapshot.prime_total.to_string(), &format!("{:.1}", share(snapshot.prime_total))]);
    println!("{table}");
}

/// Numéro le plus fréquent à chaque position du tirage trié.
pub fn display_positions(snapshot: &StatisticsSnapshot) {
    if snapshot.positional_frequency.is_empty() {
        return;
    }
    println!("\n── Positions ──");
    let mut table = new_table(vec!["Position", "Numéro dominant", "Sorties"]);
    for (i, counts) in snapshot.positional_frequency.iter().enumerate() {
        let Some((number, count)) = counts.iter().max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0))) else {
            continue;
        };
        table.add_row(vec![&format!("{}", i + 1), &format_number(number), &count.to_string()]);
    }
    println!("{table}");
}

/// Tirages par mois, du plus ancien au plus récent.
pub fn display_timeline(snapshot: &StatisticsSnapshot) {
    println!("\n── Tirages par mois ──\n");

    // la chronologie est rangée du plus récent au plus ancien
    let months: Vec<(&String, u32)> = snapshot.monthly_timeline.iter().collect();
    if months.len() < 2 {
        println!("  (Pas assez de mois à afficher)");
        return;
    }
    let points: Vec<(f32, f32)> = months
        .iter()
        .rev()
        .enumerate()
        .map(|(i, (_, count))| (i as f32, *count as f32))
        .collect();

    let y_max = months.iter().map(|(_, c)| *c).max().unwrap_or(0) as f32 + 1.0;
    let x_max = (points.len() - 1) as f32;
    let shape = textplots::Shape::Lines(&points);
    let mut chart = textplots::Chart::new_with_y_range(120, 40, 0.0, x_max, 0.0, y_max);
    println!("{}", chart.lineplot(&shape));

    let first = months.last().map(|(label, _)| label.as_str()).unwrap_or("");
    let last = months.first().map(|(label, _)| label.as_str()).unwrap_or("");
    println!("  {first} → {last}");
}

pub fn display_games(games: &[GameConfig], stored: &[(String, u32)]) {
    let mut table = new_table(vec!["Jeu", "Numéros tirés", "Plage", "Tirages en base"]);
    for game in games {
        let count = stored
            .iter()
            .find(|(name, _)| name == &game.name)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        table.add_row(vec![
            &game.name,
            &game.pick_count.to_string(),
            &format!("{}-{}", game.min_number, game.max_number),
            &count.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_rebuild_summary(results: &[(String, u32, u32)]) {
    println!("\nReconstruction terminée :");
    let mut table = new_table(vec!["Jeu", "Tirages intégrés", "Tirages ignorés"]);
    for (game, folded, skipped) in results {
        table.add_row(vec![game.as_str(), &folded.to_string(), &skipped.to_string()]);
    }
    println!("{table}");
}
