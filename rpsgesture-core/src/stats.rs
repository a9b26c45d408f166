//! Running game statistics (scoreboard)

use serde::{Deserialize, Serialize};

use crate::gesture::{Gesture, Outcome};

/// How often the first seat played each gesture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureCounts {
    pub rock: u32,
    pub paper: u32,
    pub scissors: u32,
}

impl GestureCounts {
    pub fn get(&self, gesture: Gesture) -> u32 {
        match gesture {
            Gesture::Rock => self.rock,
            Gesture::Paper => self.paper,
            Gesture::Scissors => self.scissors,
            Gesture::Unknown => 0,
        }
    }

    /// Count a gesture; Unknown is not counted
    pub fn increment(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Rock => self.rock += 1,
            Gesture::Paper => self.paper += 1,
            Gesture::Scissors => self.scissors += 1,
            Gesture::Unknown => {}
        }
    }

    /// Most played gesture, if any has been played
    pub fn favourite(&self) -> Option<Gesture> {
        [
            (Gesture::Rock, self.rock),
            (Gesture::Paper, self.paper),
            (Gesture::Scissors, self.scissors),
        ]
        .into_iter()
        .filter(|&(_, n)| n > 0)
        .max_by_key(|&(_, n)| n)
        .map(|(g, _)| g)
    }
}

/// Cumulative results, serialized as a flat snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatistics {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub current_win_streak: u32,
    pub best_win_streak: u32,
    pub per_gesture_counts: GestureCounts,
}

impl GameStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one resolved round
    pub fn record(&mut self, player: Gesture, outcome: Outcome) {
        self.total_games += 1;
        match outcome {
            Outcome::Win => {
                self.wins += 1;
                self.current_win_streak += 1;
            }
            Outcome::Loss => {
                self.losses += 1;
                self.current_win_streak = 0;
            }
            Outcome::Draw => {
                self.draws += 1;
                self.current_win_streak = 0;
            }
        }
        self.best_win_streak = self.best_win_streak.max(self.current_win_streak);
        self.per_gesture_counts.increment(player);
    }

    /// Start a new game
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn win_rate(&self) -> f32 {
        if self.total_games == 0 {
            0.0
        } else {
            self.wins as f32 / self.total_games as f32
        }
    }

    /// One-line scoreboard
    pub fn scoreboard(&self) -> String {
        format!(
            "Wins: {} | Losses: {} | Draws: {}",
            self.wins, self.losses, self.draws
        )
    }
}
