//! Stats command - show a saved scoreboard

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use rpsgesture_core::{GameStatistics, PLAYABLE};
use rpsgesture_session::load_snapshot;

#[derive(Args)]
pub struct StatsArgs {
    /// Snapshot written by `play --snapshot`
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let stats = load_snapshot(&args.snapshot)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in summary_lines(&stats) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn summary_lines(stats: &GameStatistics) -> Vec<String> {
    let mut lines = vec![
        stats.scoreboard(),
        format!("Games played: {}", stats.total_games),
        format!("Win rate: {:.1}%", stats.win_rate() * 100.0),
        format!(
            "Streak: {} (best {})",
            stats.current_win_streak, stats.best_win_streak
        ),
    ];
    for gesture in PLAYABLE {
        lines.push(format!(
            "  {:<8} {}",
            gesture,
            stats.per_gesture_counts.get(gesture)
        ));
    }
    lines
}
