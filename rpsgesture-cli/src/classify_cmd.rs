//! Classify command - run the geometric classifier on stored landmarks
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_hands(), classify_hands(), report()
//! - Level 4: argument conversion

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use rpsgesture_core::{
    order_left_to_right, BandingPolicy, ClassificationResult, GeometricClassifier,
    GestureClassifier, LandmarkSet,
};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ClassifyArgs {
    /// JSON file: one hand (21 points), a list of hands, or {"hands": [...]}
    #[arg(long, value_name = "FILE")]
    pub landmarks: PathBuf,

    /// Finger-count banding
    #[arg(long, value_enum, default_value = "range")]
    pub banding: BandingArg,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BandingArg {
    /// 0-1 Rock, 2-3 Scissors, 4-5 Paper
    Range,
    /// 0 Rock, 2 Scissors, 5 Paper
    Exact,
}

impl From<BandingArg> for BandingPolicy {
    fn from(arg: BandingArg) -> Self {
        match arg {
            BandingArg::Range => BandingPolicy::RangeBased,
            BandingArg::Exact => BandingPolicy::ExactMatch,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkFile {
    Frame { hands: Vec<LandmarkSet> },
    Many(Vec<LandmarkSet>),
    One(LandmarkSet),
}

/// Classification of one hand
#[derive(Clone, Debug, Serialize)]
struct HandReport {
    hand: usize,
    #[serde(flatten)]
    result: ClassificationResult,
    /// Why the landmarks were rejected, if they were
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<String>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run(args: ClassifyArgs) -> Result<()> {
    let hands = load_hands(&args.landmarks)?;
    tracing::info!(
        "Classifying {} hand(s) from {}",
        hands.len(),
        args.landmarks.display()
    );

    let reports = classify_hands(hands, args.banding.into());
    report(&reports, args.json)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn load_hands(path: &Path) -> Result<Vec<LandmarkSet>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read landmarks: {}", path.display()))?;
    let file: LandmarkFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse landmarks: {}", path.display()))?;
    let mut hands = match file {
        LandmarkFile::Frame { hands } | LandmarkFile::Many(hands) => hands,
        LandmarkFile::One(hand) => vec![hand],
    };
    order_left_to_right(&mut hands);
    Ok(hands)
}

fn classify_hands(hands: Vec<LandmarkSet>, banding: BandingPolicy) -> Vec<HandReport> {
    let classifier = GeometricClassifier::new(banding);
    hands
        .iter()
        .enumerate()
        .map(|(i, hand)| HandReport {
            hand: i + 1,
            result: classifier.classify(hand),
            rejected: hand.validate().err().map(|e| e.to_string()),
        })
        .collect()
}

fn report(reports: &[HandReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No hands found");
    }
    for r in reports {
        print!(
            "Hand {}: {} (confidence {:.2}, {} extended)",
            r.hand, r.result.gesture, r.result.confidence, r.result.extended_fingers
        );
        match &r.rejected {
            Some(reason) => println!(" - rejected: {}", reason),
            None => println!(),
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
