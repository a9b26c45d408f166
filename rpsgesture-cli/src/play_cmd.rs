//! Play command - replay a capture script through a live game session
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_settings(), build_session(), play(), report_results()
//! - Level 3: (delegated to rpsgesture-session)
//! - Level 4: argument conversion, formatting

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use rpsgesture_core::{Classifier, ExposurePolicy, GameMode, GameSettings, Round};
use rpsgesture_session::{load_snapshot, play_rounds, PlayReport, RecordSink, ScriptedSource, Session};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct PlayArgs {
    /// Capture script (JSONL, one frame per line)
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Number of rounds to play
    #[arg(long, default_value = "3")]
    pub rounds: usize,

    /// Settings JSON file (defaults when omitted)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Seed for the computer opponent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Two hands play each other
    #[arg(long)]
    pub multiplayer: bool,

    /// How the exposure window picks the played gesture
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Stop when the script ends instead of replaying it
    #[arg(long)]
    pub once: bool,

    /// Append each round to this JSONL log
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Resume from and save the scoreboard to this file
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Last classification when the window closes
    FinalFrame,
    /// First stabilized gesture inside the window
    FirstConfirmed,
}

impl From<PolicyArg> for ExposurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FinalFrame => ExposurePolicy::FinalFrame,
            PolicyArg::FirstConfirmed => ExposurePolicy::FirstConfirmed,
        }
    }
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run play command
///
/// 1. Merge settings file and flags
/// 2. Build the session (resuming a snapshot if one exists)
/// 3. Play the rounds on a tokio runtime
/// 4. Report results
pub fn run(args: PlayArgs) -> Result<()> {
    let settings = build_settings(&args)?;
    let source = ScriptedSource::load(&args.script)?.looping(!args.once);

    tracing::info!(
        "Playing {} round(s): {:?}, {:?}, {} frames in script",
        args.rounds,
        settings.mode,
        settings.exposure_policy,
        source.frame_count()
    );

    let session = build_session(&settings, &args)?;
    let report = play(session, source, &settings, args.rounds)?;
    report_results(&report, args.json)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Settings file first, then command-line overrides
fn build_settings(args: &PlayArgs) -> Result<GameSettings> {
    let mut settings = match &args.settings {
        Some(path) => GameSettings::load(path)?,
        None => GameSettings::default(),
    };

    if let Some(seed) = args.seed {
        settings = settings.with_seed(seed);
    }
    if args.multiplayer {
        settings.mode = GameMode::LocalMultiplayer;
    }
    if let Some(policy) = args.policy {
        settings = settings.with_policy(policy.into());
    }

    Ok(settings)
}

fn build_session(settings: &GameSettings, args: &PlayArgs) -> Result<Session> {
    let classifier = Classifier::from_settings(&settings.classifier, None)?;
    let mut session = Session::new(settings, classifier)?;

    let mut sink = RecordSink::new();
    if let Some(path) = &args.log {
        sink = sink.with_round_log(path);
    }
    if let Some(path) = &args.snapshot {
        if path.exists() {
            let stats = load_snapshot(path)?;
            tracing::info!("Resuming scoreboard: {}", stats.scoreboard());
            session = session.with_statistics(stats);
        }
        sink = sink.with_snapshot(path);
    }

    Ok(session.with_sink(sink))
}

fn play(
    session: Session,
    source: ScriptedSource,
    settings: &GameSettings,
    rounds: usize,
) -> Result<PlayReport> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let interval = settings.frame_interval();

    runtime.block_on(async { play_rounds(session, source, interval, rounds).await })
}

fn report_results(report: &PlayReport, json: bool) -> Result<()> {
    if json {
        print_json_results(report)
    } else {
        print_text_results(report);
        Ok(())
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn gesture_label(round: &Round) -> (String, String, String) {
    (
        round.player_gesture.to_string(),
        round
            .opponent_gesture
            .map_or_else(|| "-".to_string(), |g| g.to_string()),
        round.outcome.map_or_else(|| "-".to_string(), |o| o.to_string()),
    )
}

fn print_json_results(report: &PlayReport) -> Result<()> {
    #[derive(Serialize)]
    struct JsonOutput<'a> {
        rounds: &'a [Round],
        statistics: &'a rpsgesture_core::GameStatistics,
        capture_failures: u32,
        capture_stopped: bool,
    }

    let output = JsonOutput {
        rounds: &report.rounds,
        statistics: &report.statistics,
        capture_failures: report.capture_failures,
        capture_stopped: report.capture_stopped,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text_results(report: &PlayReport) {
    println!("\n=== Rounds ===");
    for (i, round) in report.rounds.iter().enumerate() {
        let (player, opponent, outcome) = gesture_label(round);
        println!("Round {:>3}: {:<8} vs {:<8} {}", i + 1, player, opponent, outcome);
    }

    let stats = &report.statistics;
    println!("\n=== Scoreboard ===");
    println!("{}", stats.scoreboard());
    println!("Games:       {}", stats.total_games);
    println!("Win rate:    {:.1}%", stats.win_rate() * 100.0);
    println!("Best streak: {}", stats.best_win_streak);
    if let Some(favourite) = stats.per_gesture_counts.favourite() {
        println!("Favourite:   {}", favourite);
    }
    if report.capture_failures > 0 {
        println!("Capture failures: {}", report.capture_failures);
    }
    if report.capture_stopped {
        println!("Capture stopped before the last round");
    }
}

// ============================================================================
// TESTS
// ============================================================================
