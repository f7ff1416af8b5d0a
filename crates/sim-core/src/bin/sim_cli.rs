//! Development harness for THE CORE.
//!
//! Not a game client: no input parsing, no rendering. Exercises
//! `Simulation::new`/`step`/`serialize`/`deserialize` from the command line
//! so the core can be poked at without a presentation layer.

use clap::{Parser, Subcommand};
use sim_core::config::Config;
use sim_core::simulation::{PlayerIntent, Simulation};
use sim_core::quests::PlayerSnapshot;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sim_cli")]
#[command(about = "Development harness for THE CORE simulation engine")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file; falls back to defaults when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts a fresh simulation and advances it by a number of minutes.
    NewGame {
        #[arg(long, default_value_t = 10)]
        minutes: u32,
    },
    /// Loads a save file, prints its state, and exits.
    LoadGame { slot: PathBuf },
    /// Starts a fresh simulation, advances it, then writes a save file.
    SaveGame { slot: PathBuf },
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = args
        .config
        .map(Config::load_or_default)
        .unwrap_or_default();

    match args.command {
        Command::NewGame { minutes } => {
            let mut sim = Simulation::new(config);
            let snapshot = PlayerSnapshot::default();
            let result = sim.step(PlayerIntent::Wait { minutes }, &snapshot);
            let view = sim.view();
            tracing::info!(
                success = result.success,
                day = view.day,
                game_time = view.game_time,
                "new game advanced"
            );
        }
        Command::LoadGame { slot } => match std::fs::read_to_string(&slot) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(blob) => match Simulation::deserialize(blob, config) {
                    Ok(sim) => {
                        let view = sim.view();
                        tracing::info!(day = view.day, game_time = view.game_time, "loaded save");
                    }
                    Err(err) => tracing::warn!(error = %err, "save rejected"),
                },
                Err(err) => tracing::warn!(error = %err, "save file is not valid JSON"),
            },
            Err(err) => tracing::warn!(path = %slot.display(), error = %err, "could not read save file"),
        },
        Command::SaveGame { slot } => {
            let mut sim = Simulation::new(config);
            let snapshot = PlayerSnapshot::default();
            sim.step(PlayerIntent::Wait { minutes: 1 }, &snapshot);
            let blob = sim.serialize();
            match serde_json::to_string_pretty(&blob) {
                Ok(text) => match std::fs::write(&slot, text) {
                    Ok(()) => tracing::info!(path = %slot.display(), "save written"),
                    Err(err) => tracing::warn!(path = %slot.display(), error = %err, "could not write save file"),
                },
                Err(err) => tracing::warn!(error = %err, "could not serialize save"),
            }
        }
    }
}
