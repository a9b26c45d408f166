//! Rock-paper-scissors gesture game - command-line front-end
//!
//! Commands:
//! - classify: Classify hands from a landmark file
//! - play: Replay a capture script through a full game session
//! - stats: Show a saved scoreboard
//! - rules: Print the rules

mod classify_cmd;
mod play_cmd;
mod stats_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rpsgesture")]
#[command(about = "Webcam rock-paper-scissors, driven by hand landmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every hand in a landmark file
    Classify(classify_cmd::ClassifyArgs),
    /// Play rounds against a scripted capture source
    Play(play_cmd::PlayArgs),
    /// Show a saved scoreboard
    Stats(stats_cmd::StatsArgs),
    /// Print the game rules
    Rules,
}

const RULES: &str = "\
Rock beats Scissors, Scissors beats Paper, and Paper beats Rock.

Show your hand to the camera when the countdown ends. The game counts your
extended fingers: a fist (0-1) is Rock, two or three fingers are Scissors,
and an open hand (4-5) is Paper. Pick the gesture that beats the computer.

A round with no readable hand counts as a loss.";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify(args) => classify_cmd::run(args),
        Commands::Play(args) => play_cmd::run(args),
        Commands::Stats(args) => stats_cmd::run(args),
        Commands::Rules => {
            println!("{}", RULES);
            Ok(())
        }
    }
}
