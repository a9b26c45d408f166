//! Round log and statistics snapshots
//!
//! Each resolved round can be appended to a JSONL log, and the running
//! statistics can be written to a pretty JSON snapshot that a later session
//! resumes from.

use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rpsgesture_core::{GameStatistics, Gesture, Outcome, Round};
use serde::{Deserialize, Serialize};

/// One line of the round log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub recorded_at: DateTime<Utc>,
    /// 1-based round number within the session
    pub round: u32,
    pub player: Gesture,
    pub opponent: Gesture,
    pub outcome: Outcome,
}

impl RoundRecord {
    /// Build from a resolved round. `None` if the round has not resolved.
    pub fn from_round(number: u32, round: &Round) -> Option<Self> {
        Some(Self {
            recorded_at: Utc::now(),
            round: number,
            player: round.player_gesture,
            opponent: round.opponent_gesture?,
            outcome: round.outcome?,
        })
    }
}

/// Append one record to a JSONL log, creating the file if needed
pub fn append_record(path: &Path, record: &RoundRecord) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open round log: {}", path.display()))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Read every record from a JSONL log
pub fn read_records(path: &Path) -> anyhow::Result<Vec<RoundRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open round log: {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("Bad round log line {} in {}", number + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Write statistics as pretty JSON
pub fn save_snapshot(path: &Path, stats: &GameStatistics) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<GameStatistics> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let stats = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;
    Ok(stats)
}

/// Where a session persists its results
#[derive(Clone, Debug, Default)]
pub struct RecordSink {
    pub round_log: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

impl RecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_round_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.round_log = Some(path.into());
        self
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// True when there is nowhere to write
    pub fn is_empty(&self) -> bool {
        self.round_log.is_none() && self.snapshot.is_none()
    }

    /// Persist one resolved round. Write failures are logged, not fatal.
    pub fn write(&self, number: u32, round: &Round, stats: &GameStatistics) {
        if let Some(path) = &self.round_log {
            if let Some(record) = RoundRecord::from_round(number, round) {
                if let Err(err) = append_record(path, &record) {
                    tracing::warn!("Could not log round {}: {:#}", number, err);
                }
            }
        }
        if let Some(path) = &self.snapshot {
            if let Err(err) = save_snapshot(path, stats) {
                tracing::warn!("Could not save snapshot: {:#}", err);
            }
        }
    }
}
