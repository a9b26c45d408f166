//! RPS Gesture Core - gesture classification and round resolution
//!
//! This crate provides the decision logic of the webcam rock-paper-scissors
//! game:
//! - Hand landmark sets (21 normalized points per hand)
//! - Extended-finger classification with pluggable strategies
//! - Temporal stabilization of per-frame classifications
//! - Round state machine and running statistics
//! - Settings shared by all of the above

pub mod landmarks;
pub mod gesture;
pub mod classifier;
pub mod stabilizer;
pub mod stats;
pub mod resolver;
pub mod settings;

// Re-exports for convenient access
pub use landmarks::{order_left_to_right, LandmarkError, LandmarkSet, Point, LANDMARK_COUNT};
pub use gesture::{resolve_outcome, ClassificationResult, Gesture, Outcome, Seat, PLAYABLE};
pub use classifier::{
    BandingPolicy, Classifier, ClassifierKind, ExternalModelClassifier, GeometricClassifier,
    GestureClassifier, GestureScores, ModelBackend,
};
pub use stabilizer::{ConfirmedGesture, Stabilizer, StabilizerConfig};
pub use stats::{GameStatistics, GestureCounts};
pub use resolver::{ComputerOpponent, Round, RoundEvent, RoundPhase, RoundResolver};
pub use settings::{ClassifierSettings, ExposurePolicy, GameMode, GameSettings, RoundTiming};
