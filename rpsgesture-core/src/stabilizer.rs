//! Temporal stabilization of per-frame classifications
//!
//! Keeps a sliding time window of recent classifications and confirms a
//! gesture only once it has been seen consistently, so single-frame misreads
//! never reach gameplay.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gesture::{ClassificationResult, Gesture};

/// Stabilizer policy constants
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Entries at least this old are pruned
    #[serde(rename = "window_ms", with = "crate::settings::millis")]
    pub window: Duration,
    /// Fewer entries than this never confirm
    pub min_history: usize,
    /// How many recent entries the agreement check looks at
    pub lookback: usize,
    /// Occurrences of the current gesture needed within the lookback
    pub min_agreement: usize,
    /// Current-frame confidence must be strictly above this
    pub min_confidence: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            min_history: 3,
            lookback: 5,
            min_agreement: 3,
            min_confidence: 0.70,
        }
    }
}

/// One observed classification
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryEntry {
    pub gesture: Gesture,
    pub confidence: f32,
    pub timestamp: Duration,
    pub extended_fingers: u8,
}

/// A gesture that passed the consistency check
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedGesture {
    pub gesture: Gesture,
    pub confidence: f32,
    pub extended_fingers: u8,
}

/// Rolling classification history for one hand
#[derive(Clone, Debug, Default)]
pub struct Stabilizer {
    config: StabilizerConfig,
    history: VecDeque<HistoryEntry>,
    /// Gesture already reported for the current qualifying run
    latched: Option<Gesture>,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            latched: None,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Feed one frame's classification.
    ///
    /// Returns a confirmation the first time the check passes for a gesture.
    /// Later frames of the same gesture return `None` until that gesture no
    /// longer holds `min_agreement` of the recent entries; a single Unknown or
    /// weak frame does not re-arm it.
    pub fn observe(
        &mut self,
        result: ClassificationResult,
        now: Duration,
    ) -> Option<ConfirmedGesture> {
        self.history.push_back(HistoryEntry {
            gesture: result.gesture,
            confidence: result.confidence,
            timestamp: now,
            extended_fingers: result.extended_fingers,
        });
        self.prune(now);

        if let Some(latched) = self.latched {
            if self.agreeing(latched) < self.config.min_agreement {
                self.latched = None;
            }
        }

        if !self.qualifies(&result) {
            return None;
        }

        if self.latched == Some(result.gesture) {
            return None;
        }
        self.latched = Some(result.gesture);

        tracing::debug!(
            "Confirmed {} (confidence {:.2}, {} fingers)",
            result.gesture,
            result.confidence,
            result.extended_fingers
        );

        Some(ConfirmedGesture {
            gesture: result.gesture,
            confidence: result.confidence,
            extended_fingers: result.extended_fingers,
        })
    }

    /// Drop entries that have aged out of the window
    pub fn prune(&mut self, now: Duration) {
        let window = self.config.window;
        while let Some(front) = self.history.front() {
            if now.saturating_sub(front.timestamp) >= window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.history.clear();
        self.latched = None;
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn qualifies(&self, current: &ClassificationResult) -> bool {
        if current.gesture == Gesture::Unknown {
            return false;
        }
        if self.history.len() < self.config.min_history {
            return false;
        }
        if current.confidence <= self.config.min_confidence {
            return false;
        }

        self.agreeing(current.gesture) >= self.config.min_agreement
    }

    /// Occurrences of `gesture` among the last `lookback` entries
    fn agreeing(&self, gesture: Gesture) -> usize {
        self.history
            .iter()
            .rev()
            .take(self.config.lookback)
            .filter(|entry| entry.gesture == gesture)
            .count()
    }
}
