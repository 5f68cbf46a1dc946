use crate::model::structures::game_mode::GameMode;
use clap::{Parser, Subcommand};
use std::str::FromStr;

#[derive(Parser, Clone, Debug)]
#[command(
    display_name = "pp Processor",
    author = "osu! pp processor",
    long_about = "Computes performance values of scores and players for one game mode"
)]
pub struct Args {
    /// Game mode to process. Accepts osu, taiko, catch, mania and their
    /// common aliases (standard, fruits, ctb, ...)
    #[arg(short, long, default_value = "osu", value_parser = parse_mode)]
    pub mode: GameMode,

    /// Path of the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Continuously process new scores and newly approved maps
    Monitor,

    /// Reprocess every player of the mode
    All {
        /// Resume after the stored checkpoint instead of starting over
        #[arg(long = "continue")]
        resume: bool,

        /// Worker threads, each with its own connections
        #[arg(short, long, default_value_t = 32)]
        threads: usize
    },

    /// Reprocess specific players, given by id or username
    Users {
        #[arg(required = true)]
        players: Vec<String>
    },

    /// Reprocess the owners of specific scores
    Scores {
        #[arg(required = true)]
        score_ids: Vec<i64>
    }
}

fn parse_mode(s: &str) -> Result<GameMode, String> {
    GameMode::from_str(s).map_err(|_| format!("unknown game mode '{s}'"))
}
