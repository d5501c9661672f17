mod display;
mod import;
mod service;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use lotostats_db::cache::{MemoryCache, SnapshotCache, SqliteCache};
use lotostats_db::db::{count_draws, db_path, fetch_last_draws, list_games, migrate, open_db};
use lotostats_db::models::{DrawRecord, GameConfig};
use lotostats_db::rusqlite::Connection;
use lotostats_db::source::{load_published, DrawSource, JsonFileSink, ResultSink};
use lotostats_engine::config::load_settings;
use lotostats_engine::{build, Settings, StatisticsSnapshot, ValidationPolicy};

use crate::display::{
    display_distribution, display_draws, display_frequencies, display_games, display_import_summary,
    display_positions, display_rebuild_summary, display_summary, display_timeline, display_top_pairs,
};
use crate::service::SnapshotService;

#[derive(Parser)]
#[command(name = "lotostats", about = "Statistiques de tirages de loterie")]
struct Cli {
    /// Fichier de réglages JSON (jeux, politique de validation, durées de cache)
    #[arg(long, global = true, default_value = "lotostats.json")]
    config: PathBuf,

    /// Chemin de la base SQLite
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Garder le cache en mémoire plutôt qu'en base
    #[arg(long, global = true)]
    memory_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier CSV
    Import {
        /// Jeu concerné
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Chemin vers le fichier CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Lister les derniers tirages
    List {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Afficher les statistiques (fréquences, retards, paires, répartitions)
    Stats {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Refuser tout tirage invalide au lieu de l'ignorer (revalide tout l'historique, sans cache)
        #[arg(long)]
        strict: bool,

        /// Nombre de paires et de numéros chauds/froids à mettre en avant
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Reconstruire l'instantané à partir de tout l'historique
    Rebuild {
        #[arg(short, long, default_value = "megasena")]
        game: String,
    },

    /// Intégrer les nouveaux tirages dans l'instantané publié
    Refresh {
        #[arg(short, long, default_value = "megasena")]
        game: String,
    },

    /// Exporter l'instantané historique en JSON
    Export {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Fichier JSON de sortie
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Lister les jeux configurés
    Games,

    /// Reconstruire en parallèle tous les jeux ayant des tirages
    All,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;
    let path = cli.db.clone().unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;

    let cache: Box<dyn SnapshotCache<StatisticsSnapshot> + '_> = if cli.memory_cache {
        Box::new(MemoryCache::<StatisticsSnapshot>::new(settings.cache))
    } else {
        Box::new(SqliteCache::new(&conn, settings.cache))
    };
    let service = SnapshotService::new(&conn, cache.as_ref(), settings.engine.clone());

    match cli.command {
        Command::Import { game, file } => cmd_import(&conn, &service, &settings, &game, &file),
        Command::List { game, last } => cmd_list(&conn, &game, last),
        Command::Stats { game, strict, top } => cmd_stats(&conn, cache.as_ref(), &settings, &game, strict, top),
        Command::Rebuild { game } => {
            let game = resolve_game(&settings, &game)?;
            let snapshot = service.rebuild(game)?;
            display_summary(&snapshot);
            Ok(())
        }
        Command::Refresh { game } => {
            let game = resolve_game(&settings, &game)?;
            let snapshot = service.refresh(game)?;
            display_summary(&snapshot);
            Ok(())
        }
        Command::Export { game, output } => cmd_export(&service, &settings, &game, &output),
        Command::Games => {
            display_games(&settings.games, &list_games(&conn)?);
            Ok(())
        }
        Command::All => cmd_all(&conn, &service, &settings),
    }
}

fn resolve_game<'s>(settings: &'s Settings, name: &str) -> Result<&'s GameConfig> {
    settings
        .game(name)
        .with_context(|| format!("Jeu inconnu : '{}' (voir `lotostats games`)", name))
}

fn ensure_not_empty(conn: &Connection, game: &str) -> Result<bool> {
    let n = count_draws(conn, game)?;
    if n == 0 {
        println!("Base vide pour {game}. Lancez d'abord : lotostats import --game {game} --file <csv>");
        return Ok(false);
    }
    Ok(true)
}

fn cmd_import(conn: &Connection, service: &SnapshotService, settings: &Settings, game: &str, file: &Path) -> Result<()> {
    resolve_game(settings, game)?;
    let result = import::import_csv(conn, game, file)?;
    display_import_summary(&result);

    // un concours déjà couvert par l'instantané ne peut pas être fusionné
    if let Some(lowest) = result.lowest_inserted {
        let published: Option<StatisticsSnapshot> = load_published(conn, game)?;
        let covered = published.and_then(|s| s.watermark).is_some_and(|w| lowest <= w);
        if covered {
            log::warn!("Concours {} antérieur à l'instantané publié, reconstruction nécessaire", lowest);
            service.invalidate(game)?;
        }
    }
    Ok(())
}

fn cmd_list(conn: &Connection, game: &str, last: u32) -> Result<()> {
    if !ensure_not_empty(conn, game)? {
        return Ok(());
    }
    let draws = fetch_last_draws(conn, game, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_stats(
    conn: &Connection,
    cache: &dyn SnapshotCache<StatisticsSnapshot>,
    settings: &Settings,
    game: &str,
    strict: bool,
    top: usize,
) -> Result<()> {
    let game = resolve_game(settings, game)?;
    if !ensure_not_empty(conn, &game.name)? {
        return Ok(());
    }

    let mut engine = settings.engine.clone();
    if strict {
        engine.policy = ValidationPolicy::Strict;
    }
    let service = SnapshotService::new(conn, cache, engine);
    let snapshot = service.current(game)?;

    display_summary(&snapshot);
    display_frequencies(&snapshot, game, top);
    display_top_pairs(&snapshot, top);
    display_distribution(&snapshot);
    display_positions(&snapshot);
    display_timeline(&snapshot);
    Ok(())
}

fn cmd_export(service: &SnapshotService, settings: &Settings, game: &str, output: &Path) -> Result<()> {
    let game = resolve_game(settings, game)?;
    let snapshot = service.historical(game)?;
    let sink = JsonFileSink::new(output);
    sink.publish(&game.name, &snapshot)?;
    println!("Instantané {} exporté vers {}", game.name, sink.path().display());
    Ok(())
}

fn cmd_all(conn: &Connection, service: &SnapshotService, settings: &Settings) -> Result<()> {
    // lecture séquentielle : la connexion ne traverse pas les threads
    let mut inputs: Vec<(&GameConfig, Vec<DrawRecord>)> = Vec::new();
    for game in &settings.games {
        let history = conn.fetch_history(&game.name)?;
        if !history.is_empty() {
            inputs.push((game, history));
        }
    }
    if inputs.is_empty() {
        println!("Aucun jeu n'a de tirages en base.");
        return Ok(());
    }

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let engine = &settings.engine;
    let outcomes: Vec<_> = inputs
        .par_iter()
        .map(|(game, history)| {
            let outcome = build(history, game, engine);
            pb.inc(1);
            pb.set_message(game.name.clone());
            (*game, outcome)
        })
        .collect();
    pb.finish_and_clear();

    let mut summary = Vec::new();
    for (game, outcome) in outcomes {
        match outcome {
            Ok(outcome) => {
                service.store(game, &outcome)?;
                summary.push((game.name.clone(), outcome.folded, outcome.skipped.len() as u32));
            }
            Err(e) => log::warn!("Reconstruction échouée pour {} : {}", game.name, e),
        }
    }
    display_rebuild_summary(&summary);
    Ok(())
}
