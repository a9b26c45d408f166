//! Game settings
//!
//! Everything tunable lives here and is passed explicitly to the classifier,
//! stabilizer and resolver. Settings load from and save to JSON; missing
//! fields take their defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classifier::{BandingPolicy, ClassifierKind};
use crate::gesture::Gesture;
use crate::stabilizer::StabilizerConfig;

/// Who the first seat plays against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Against a uniformly random computer gesture
    #[default]
    SinglePlayer,
    /// Two hands in front of the same camera
    LocalMultiplayer,
}

impl GameMode {
    pub fn seats(self) -> usize {
        match self {
            GameMode::SinglePlayer => 1,
            GameMode::LocalMultiplayer => 2,
        }
    }
}

/// How the exposure window turns frames into a played gesture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposurePolicy {
    /// Use the last classification seen when the window closes
    #[default]
    FinalFrame,
    /// Use the first stabilizer confirmation inside the window
    FirstConfirmed,
}

/// Classifier selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub kind: ClassifierKind,
    pub banding: BandingPolicy,
    /// External model scores below this classify as Unknown
    pub model_min_score: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Geometric,
            banding: BandingPolicy::RangeBased,
            model_min_score: 0.5,
        }
    }
}

/// Round phase durations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTiming {
    /// Countdown length in ticks
    pub countdown_ticks: u32,
    #[serde(rename = "tick_interval_ms", with = "millis")]
    pub tick_interval: Duration,
    #[serde(rename = "exposure_window_ms", with = "millis")]
    pub exposure_window: Duration,
    /// How long a resolved round stays on screen
    #[serde(rename = "display_delay_ms", with = "millis")]
    pub display_delay: Duration,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            tick_interval: Duration::from_secs(1),
            exposure_window: Duration::from_secs(3),
            display_delay: Duration::from_secs(3),
        }
    }
}

impl RoundTiming {
    /// Shortened timings for tests and scripted replays
    pub fn fast() -> Self {
        Self {
            countdown_ticks: 1,
            tick_interval: Duration::from_millis(20),
            exposure_window: Duration::from_millis(120),
            display_delay: Duration::from_millis(20),
        }
    }
}

/// Top-level settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub mode: GameMode,
    pub exposure_policy: ExposurePolicy,
    pub timing: RoundTiming,
    pub classifier: ClassifierSettings,
    pub stabilizer: StabilizerConfig,
    /// Capture cadence in frames per second
    pub capture_fps: u32,
    /// Random seed for the computer opponent (None = random)
    pub seed: Option<u64>,
    /// Fixed computer moves, cycled in order (empty = random)
    pub opponent_script: Vec<Gesture>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            mode: GameMode::SinglePlayer,
            exposure_policy: ExposurePolicy::FinalFrame,
            timing: RoundTiming::default(),
            classifier: ClassifierSettings::default(),
            stabilizer: StabilizerConfig::default(),
            capture_fps: 30,
            seed: None,
            opponent_script: Vec::new(),
        }
    }
}

impl GameSettings {
    /// Two-player settings
    pub fn multiplayer() -> Self {
        Self {
            mode: GameMode::LocalMultiplayer,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_opponent_script(mut self, moves: Vec<Gesture>) -> Self {
        self.opponent_script = moves;
        self
    }

    pub fn with_policy(mut self, policy: ExposurePolicy) -> Self {
        self.exposure_policy = policy;
        self
    }

    pub fn with_banding(mut self, banding: BandingPolicy) -> Self {
        self.classifier.banding = banding;
        self
    }

    pub fn with_timing(mut self, timing: RoundTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Interval between capture polls
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.capture_fps.max(1)
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        Ok(settings)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Serialize a `Duration` as whole milliseconds
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
