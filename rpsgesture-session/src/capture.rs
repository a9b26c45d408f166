//! Capture driver
//!
//! A `LandmarkSource` stands in for the camera plus hand detector: each poll
//! yields the hands found in one frame. The driver polls it on a blocking
//! thread at the configured frame rate and publishes into the latest-wins
//! channel. Sources are blocking by nature (camera reads, detector calls),
//! which is why they run off the async runtime.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rpsgesture_core::LandmarkSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::frames::{FrameContent, FrameSender};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("frame read failed: {0}")]
    ReadFailed(String),

    #[error("hand detector failed: {0}")]
    Detector(String),
}

/// Camera plus landmark detector
pub trait LandmarkSource: Send {
    /// Poll one frame. `None` means the source has stopped for good.
    fn read(&mut self) -> Option<Result<Vec<LandmarkSet>, CaptureError>>;
}

// ============================================================================
// SCRIPTED SOURCE
// ============================================================================

fn one() -> u32 {
    1
}

/// One line of a capture script
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    /// Detected hands, repeated for `repeat` polls
    Hands {
        hands: Vec<LandmarkSet>,
        #[serde(default = "one")]
        repeat: u32,
    },
    /// A failed read, repeated for `repeat` polls
    Failure {
        error: String,
        #[serde(default = "one")]
        repeat: u32,
    },
}

impl ScriptStep {
    pub fn hands(hands: Vec<LandmarkSet>, repeat: u32) -> Self {
        ScriptStep::Hands { hands, repeat }
    }

    pub fn failure(error: impl Into<String>, repeat: u32) -> Self {
        ScriptStep::Failure {
            error: error.into(),
            repeat,
        }
    }

    fn repeat(&self) -> u32 {
        match self {
            ScriptStep::Hands { repeat, .. } | ScriptStep::Failure { repeat, .. } => *repeat,
        }
    }

    fn output(&self) -> Result<Vec<LandmarkSet>, CaptureError> {
        match self {
            ScriptStep::Hands { hands, .. } => Ok(hands.clone()),
            ScriptStep::Failure { error, .. } => Err(CaptureError::ReadFailed(error.clone())),
        }
    }
}

/// Replays recorded landmark frames
#[derive(Clone, Debug)]
pub struct ScriptedSource {
    steps: Vec<ScriptStep>,
    position: usize,
    emitted: u32,
    looping: bool,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            position: 0,
            emitted: 0,
            looping: false,
        }
    }

    /// Start over from the first step instead of stopping
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Load a JSONL script. Blank lines and lines starting with `#` are skipped.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open capture script: {}", path.display()))?;
        let mut steps = Vec::new();
        for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep = serde_json::from_str(line).with_context(|| {
                format!("Bad capture script line {} in {}", number + 1, path.display())
            })?;
            steps.push(step);
        }
        if steps.is_empty() {
            anyhow::bail!("Capture script {} has no frames", path.display());
        }
        Ok(Self::new(steps))
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Total polls in one pass through the script
    pub fn frame_count(&self) -> u64 {
        self.steps.iter().map(|s| s.repeat().max(1) as u64).sum()
    }
}

impl LandmarkSource for ScriptedSource {
    fn read(&mut self) -> Option<Result<Vec<LandmarkSet>, CaptureError>> {
        if self.steps.is_empty() {
            return None;
        }
        if self.position >= self.steps.len() {
            if !self.looping {
                return None;
            }
            self.position = 0;
        }

        let step = &self.steps[self.position];
        let output = step.output();
        self.emitted += 1;
        if self.emitted >= step.repeat().max(1) {
            self.position += 1;
            self.emitted = 0;
        }
        Some(output)
    }
}

// ============================================================================
// DRIVER
// ============================================================================

/// Running capture driver
#[derive(Debug)]
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<u64>,
}

impl CaptureHandle {
    /// Ask the driver to stop after its current poll
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Wait for the driver to finish. Returns the number of frames published.
    pub async fn join(self) -> anyhow::Result<u64> {
        let published = self.task.await.context("Capture driver panicked")?;
        Ok(published)
    }
}

/// Poll `source` every `interval` on a blocking thread.
///
/// The driver ends when the source is exhausted, when `stop` is requested,
/// or when the receiving session has gone away. The sender is dropped on
/// exit, which the session sees as capture stopping.
pub fn spawn_capture<S>(mut source: S, interval: Duration, mut frames: FrameSender) -> CaptureHandle
where
    S: LandmarkSource + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let task = tokio::task::spawn_blocking(move || {
        let mut published = 0;
        while !flag.load(Ordering::Relaxed) && !frames.is_closed() {
            let content = match source.read() {
                Some(Ok(hands)) => FrameContent::Hands(hands),
                Some(Err(err)) => {
                    tracing::warn!("Capture failed: {}", err);
                    FrameContent::Failed(err)
                }
                None => {
                    tracing::info!("Capture source exhausted after {} frames", published);
                    break;
                }
            };
            frames.publish(content);
            published += 1;
            std::thread::sleep(interval);
        }
        published
    });

    CaptureHandle { stop, task }
}
