//! Gesture categories, classification results and round outcomes

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gesture category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    Rock,
    Paper,
    Scissors,
    /// No confident classification
    Unknown,
}

/// The three gestures a round can actually be played with
pub const PLAYABLE: [Gesture; 3] = [Gesture::Rock, Gesture::Paper, Gesture::Scissors];

impl Gesture {
    pub fn is_playable(self) -> bool {
        self != Gesture::Unknown
    }

    /// True if `self` defeats `other` under the fixed winning pairs
    pub fn beats(self, other: Gesture) -> bool {
        matches!(
            (self, other),
            (Gesture::Rock, Gesture::Scissors)
                | (Gesture::Paper, Gesture::Rock)
                | (Gesture::Scissors, Gesture::Paper)
        )
    }

    /// Uniform draw over the playable gestures
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        PLAYABLE[rng.gen_range(0..PLAYABLE.len())]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::Rock => "rock",
            Gesture::Paper => "paper",
            Gesture::Scissors => "scissors",
            Gesture::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One frame's classification of one hand
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub gesture: Gesture,
    /// 0.0 to 1.0
    pub confidence: f32,
    /// 0 to 5
    pub extended_fingers: u8,
}

impl ClassificationResult {
    pub const fn new(gesture: Gesture, confidence: f32, extended_fingers: u8) -> Self {
        Self {
            gesture,
            confidence,
            extended_fingers,
        }
    }

    /// Result for malformed or missing input
    pub const fn unknown() -> Self {
        Self::new(Gesture::Unknown, 0.0, 0)
    }
}

/// Round outcome from the first seat's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Draw => "draw",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resolve a round.
///
/// A player holding Unknown forfeits. An Unknown opponent only happens in
/// local multiplayer, where the second hand forfeits instead.
pub fn resolve_outcome(player: Gesture, opponent: Gesture) -> Outcome {
    if player == Gesture::Unknown {
        Outcome::Loss
    } else if player == opponent {
        Outcome::Draw
    } else if opponent == Gesture::Unknown || player.beats(opponent) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

/// Player position in a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    One = 0,
    Two = 1,
}

impl Seat {
    /// Seats in index order
    pub const ALL: [Seat; 2] = [Seat::One, Seat::Two];

    pub fn other(self) -> Self {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}
