//! Round state machine
//!
//! `Waiting -> Countdown -> Exposing -> Resolved -> Waiting`
//!
//! The resolver is driven by a single clock: every call carries `now`, a
//! `Duration` since the session started. It never blocks and never
//! reads the clock itself. Statistics are owned by the caller and passed into
//! every call that can resolve a round.

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::gesture::{resolve_outcome, ClassificationResult, Gesture, Outcome, Seat};
use crate::settings::{ExposurePolicy, GameMode, GameSettings, RoundTiming};
use crate::stabilizer::{ConfirmedGesture, Stabilizer};
use crate::stats::GameStatistics;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Where the resolver is in the round cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    Waiting,
    Countdown { remaining: u32, next_tick_at: Duration },
    Exposing { deadline: Duration },
    Resolved { until: Duration },
}

impl RoundPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Countdown { .. } => "countdown",
            RoundPhase::Exposing { .. } => "exposing",
            RoundPhase::Resolved { .. } => "resolved",
        }
    }
}

/// One countdown-capture-resolve cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub player_gesture: Gesture,
    /// Unset until the round resolves
    pub opponent_gesture: Option<Gesture>,
    pub outcome: Option<Outcome>,
}

impl Round {
    fn new() -> Self {
        Self {
            player_gesture: Gesture::Unknown,
            opponent_gesture: None,
            outcome: None,
        }
    }
}

/// Notifications for the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum RoundEvent {
    CountdownStarted { remaining: u32 },
    CountdownTick { remaining: u32 },
    ExposureStarted { window: Duration },
    GestureConfirmed { seat: Seat, gesture: ConfirmedGesture },
    RoundResolved(Round),
    RoundCleared,
}

// ============================================================================
// COMPUTER OPPONENT
// ============================================================================

/// Source of the computer's gesture in single-player rounds
#[derive(Clone, Debug)]
pub enum ComputerOpponent {
    /// Uniform over rock, paper, scissors
    Random(ChaCha8Rng),
    /// Fixed sequence, cycled
    Scripted { moves: Vec<Gesture>, next: usize },
}

impl ComputerOpponent {
    pub fn random(seed: Option<u64>) -> Self {
        ComputerOpponent::Random(create_rng(seed))
    }

    /// Scripted opponent; fails unless at least one move is playable
    pub fn scripted(moves: Vec<Gesture>) -> anyhow::Result<Self> {
        let moves: Vec<_> = moves.into_iter().filter(|g| g.is_playable()).collect();
        if moves.is_empty() {
            anyhow::bail!("Scripted opponent needs at least one of rock, paper or scissors");
        }
        Ok(ComputerOpponent::Scripted { moves, next: 0 })
    }

    /// Scripted when the settings carry a script, random otherwise
    pub fn from_settings(settings: &GameSettings) -> anyhow::Result<Self> {
        if settings.opponent_script.is_empty() {
            Ok(Self::random(settings.seed))
        } else {
            Self::scripted(settings.opponent_script.clone())
        }
    }

    pub fn pick(&mut self) -> Gesture {
        match self {
            ComputerOpponent::Random(rng) => Gesture::random(rng),
            ComputerOpponent::Scripted { moves, next } => {
                let gesture = moves[*next % moves.len()];
                *next = (*next + 1) % moves.len();
                gesture
            }
        }
    }
}

/// Seeded generator, or one drawn from entropy when no seed is set
pub fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Round state machine
pub struct RoundResolver {
    mode: GameMode,
    policy: ExposurePolicy,
    timing: RoundTiming,
    phase: RoundPhase,
    round: Option<Round>,
    /// Per-seat capture for the current exposure
    captures: [Option<ClassificationResult>; 2],
    stabilizers: [Stabilizer; 2],
    opponent: ComputerOpponent,
    rounds_played: u32,
}

impl RoundResolver {
    pub fn new(settings: &GameSettings, opponent: ComputerOpponent) -> Self {
        Self {
            mode: settings.mode,
            policy: settings.exposure_policy,
            timing: settings.timing.clone(),
            phase: RoundPhase::Waiting,
            round: None,
            captures: [None, None],
            stabilizers: [
                Stabilizer::new(settings.stabilizer.clone()),
                Stabilizer::new(settings.stabilizer.clone()),
            ],
            opponent,
            rounds_played: 0,
        }
    }

    /// Resolver with the opponent the settings describe
    pub fn from_settings(settings: &GameSettings) -> anyhow::Result<Self> {
        Ok(Self::new(settings, ComputerOpponent::from_settings(settings)?))
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_waiting(&self) -> bool {
        self.phase == RoundPhase::Waiting
    }

    /// Countdown or exposure under way
    pub fn in_progress(&self) -> bool {
        matches!(
            self.phase,
            RoundPhase::Countdown { .. } | RoundPhase::Exposing { .. }
        )
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Begin a round. Ignored unless waiting.
    pub fn start_round(&mut self, now: Duration) -> Vec<RoundEvent> {
        if !self.is_waiting() {
            tracing::debug!("Ignoring start round while {}", self.phase.name());
            return Vec::new();
        }

        self.round = Some(Round::new());
        let ticks = self.timing.countdown_ticks;
        if ticks == 0 {
            return vec![self.begin_exposure(now)];
        }

        self.phase = RoundPhase::Countdown {
            remaining: ticks,
            next_tick_at: now + self.timing.tick_interval,
        };
        vec![RoundEvent::CountdownStarted { remaining: ticks }]
    }

    /// Advance every timer that has expired by `now`
    pub fn tick(&mut self, now: Duration, stats: &mut GameStatistics) -> Vec<RoundEvent> {
        let mut events = Vec::new();

        loop {
            let phase = self.phase;
            match phase {
                RoundPhase::Countdown { remaining, next_tick_at } if now >= next_tick_at => {
                    let remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        events.push(self.begin_exposure(next_tick_at));
                    } else {
                        self.phase = RoundPhase::Countdown {
                            remaining,
                            next_tick_at: next_tick_at + self.timing.tick_interval,
                        };
                        events.push(RoundEvent::CountdownTick { remaining });
                    }
                }
                RoundPhase::Exposing { deadline } if now >= deadline => {
                    events.push(self.resolve(deadline, stats));
                }
                RoundPhase::Resolved { until } if now >= until => {
                    self.phase = RoundPhase::Waiting;
                    self.round = None;
                    events.push(RoundEvent::RoundCleared);
                }
                _ => break,
            }
        }

        events
    }

    /// Feed one frame's classifications, one per detected hand, in seat order.
    ///
    /// An empty slice means no hand was seen (or the frame could not be read).
    pub fn observe(
        &mut self,
        hands: &[ClassificationResult],
        now: Duration,
        stats: &mut GameStatistics,
    ) -> Vec<RoundEvent> {
        let mut events = self.tick(now, stats);
        if !matches!(self.phase, RoundPhase::Exposing { .. }) {
            return events;
        }

        let seats = self.mode.seats();
        match self.policy {
            ExposurePolicy::FinalFrame => {
                for seat in Seat::ALL.into_iter().take(seats) {
                    self.captures[seat.index()] = hands.get(seat.index()).copied();
                }
            }
            ExposurePolicy::FirstConfirmed => {
                for seat in Seat::ALL.into_iter().take(seats) {
                    let i = seat.index();
                    if self.captures[i].is_some() {
                        continue;
                    }
                    let stabilizer = &mut self.stabilizers[i];
                    match hands.get(i) {
                        Some(&hand) => {
                            if let Some(confirmed) = stabilizer.observe(hand, now) {
                                self.captures[i] = Some(ClassificationResult::new(
                                    confirmed.gesture,
                                    confirmed.confidence,
                                    confirmed.extended_fingers,
                                ));
                                events.push(RoundEvent::GestureConfirmed {
                                    seat,
                                    gesture: confirmed,
                                });
                            }
                        }
                        None => stabilizer.prune(now),
                    }
                }

                if self.captures[..seats].iter().all(Option::is_some) {
                    events.push(self.resolve(now, stats));
                }
            }
        }

        events
    }

    /// Capture stopped. Forfeits a round in countdown or exposure.
    pub fn abort(&mut self, now: Duration, stats: &mut GameStatistics) -> Vec<RoundEvent> {
        if !self.in_progress() {
            return Vec::new();
        }
        tracing::warn!("Capture stopped during {}, forfeiting round", self.phase.name());
        self.captures = [None, None];
        vec![self.resolve(now, stats)]
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    fn begin_exposure(&mut self, at: Duration) -> RoundEvent {
        self.captures = [None, None];
        for stabilizer in &mut self.stabilizers {
            stabilizer.reset();
        }
        let window = self.timing.exposure_window;
        self.phase = RoundPhase::Exposing {
            deadline: at + window,
        };
        RoundEvent::ExposureStarted { window }
    }

    fn resolve(&mut self, at: Duration, stats: &mut GameStatistics) -> RoundEvent {
        let captured = |c: Option<ClassificationResult>| c.map_or(Gesture::Unknown, |c| c.gesture);

        let player = captured(self.captures[Seat::One.index()]);
        let opponent = match self.mode {
            GameMode::SinglePlayer => self.opponent.pick(),
            GameMode::LocalMultiplayer => captured(self.captures[Seat::Two.index()]),
        };
        let outcome = resolve_outcome(player, opponent);
        stats.record(player, outcome);
        self.rounds_played += 1;

        tracing::info!(
            "Round {}: {} vs {} -> {} ({})",
            self.rounds_played,
            player,
            opponent,
            outcome,
            stats.scoreboard()
        );

        let round = self.round.get_or_insert_with(Round::new);
        round.player_gesture = player;
        round.opponent_gesture = Some(opponent);
        round.outcome = Some(outcome);
        let round = round.clone();

        self.captures = [None, None];
        self.phase = RoundPhase::Resolved {
            until: at + self.timing.display_delay,
        };
        RoundEvent::RoundResolved(round)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ROCK: ClassificationResult = ClassificationResult::new(Gesture::Rock, 0.90, 0);
    const PAPER: ClassificationResult = ClassificationResult::new(Gesture::Paper, 0.90, 5);
    const SCISSORS: ClassificationResult = ClassificationResult::new(Gesture::Scissors, 0.85, 2);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn timing() -> RoundTiming {
        RoundTiming {
            countdown_ticks: 3,
            tick_interval: ms(1000),
            exposure_window: ms(3000),
            display_delay: ms(3000),
        }
    }

    fn resolver(settings: GameSettings, opponent: &[Gesture]) -> RoundResolver {
        let opponent = ComputerOpponent::scripted(opponent.to_vec()).unwrap();
        RoundResolver::new(&settings.with_timing(timing()), opponent)
    }

    fn resolved(events: &[RoundEvent]) -> Option<&Round> {
        events.iter().find_map(|e| match e {
            RoundEvent::RoundResolved(round) => Some(round),
            _ => None,
        })
    }

    #[test]
    fn test_countdown_then_exposure() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Rock]);

        assert_eq!(r.start_round(ms(0)), vec![RoundEvent::CountdownStarted { remaining: 3 }]);
        assert!(r.tick(ms(999), &mut stats).is_empty());
        assert_eq!(r.tick(ms(1000), &mut stats), vec![RoundEvent::CountdownTick { remaining: 2 }]);
        assert_eq!(r.tick(ms(2000), &mut stats), vec![RoundEvent::CountdownTick { remaining: 1 }]);
        assert_eq!(
            r.tick(ms(3000), &mut stats),
            vec![RoundEvent::ExposureStarted { window: ms(3000) }]
        );
        assert_eq!(r.phase(), RoundPhase::Exposing { deadline: ms(6000) });
    }

    #[test]
    fn test_zero_countdown_exposes_immediately() {
        let settings = GameSettings::default().with_timing(RoundTiming {
            countdown_ticks: 0,
            ..timing()
        });
        let mut r = RoundResolver::new(&settings, ComputerOpponent::random(Some(1)));
        let events = r.start_round(ms(0));
        assert!(matches!(events[..], [RoundEvent::ExposureStarted { .. }]));
        assert!(r.in_progress());
    }

    #[test]
    fn test_rock_beats_scissors_end_to_end() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Scissors]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[ROCK], ms(5900), &mut stats);
        let events = r.tick(ms(6000), &mut stats);

        let round = resolved(&events).expect("round should resolve at deadline");
        assert_eq!(round.player_gesture, Gesture::Rock);
        assert_eq!(round.opponent_gesture, Some(Gesture::Scissors));
        assert_eq!(round.outcome, Some(Outcome::Win));

        assert_eq!(stats.wins, 1);
        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.current_win_streak, 1);
        assert_eq!(stats.best_win_streak, 1);
        assert_eq!(stats.per_gesture_counts.get(Gesture::Rock), 1);
    }

    #[test]
    fn test_empty_exposure_forfeits() {
        let mut stats = GameStatistics::new();
        stats.record(Gesture::Paper, Outcome::Win);
        let mut r = resolver(GameSettings::default(), &[Gesture::Paper]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[], ms(4000), &mut stats);
        let events = r.tick(ms(6000), &mut stats);

        let round = resolved(&events).unwrap();
        assert_eq!(round.player_gesture, Gesture::Unknown);
        assert_eq!(round.outcome, Some(Outcome::Loss));
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.current_win_streak, 0);
        assert_eq!(stats.best_win_streak, 1);
    }

    #[test]
    fn test_final_frame_uses_last_frame() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[PAPER], ms(3100), &mut stats);
        r.observe(&[SCISSORS], ms(5000), &mut stats);
        // Hand left the frame before the window closed
        r.observe(&[], ms(5500), &mut stats);
        let round = resolved(&r.tick(ms(6000), &mut stats)).cloned().unwrap();
        assert_eq!(round.player_gesture, Gesture::Unknown);

        // Next round: hand stays in view until the end
        r.tick(ms(9000), &mut stats);
        r.start_round(ms(9000));
        r.tick(ms(12000), &mut stats);
        r.observe(&[PAPER], ms(12100), &mut stats);
        let round = resolved(&r.tick(ms(15000), &mut stats)).cloned().unwrap();
        assert_eq!(round.player_gesture, Gesture::Paper);
        assert_eq!(round.outcome, Some(Outcome::Win));
    }

    #[test]
    fn test_first_confirmed_resolves_early() {
        let mut stats = GameStatistics::new();
        let settings = GameSettings::default().with_policy(ExposurePolicy::FirstConfirmed);
        let mut r = resolver(settings, &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        assert!(r.observe(&[PAPER], ms(3000), &mut stats).is_empty());
        assert!(r.observe(&[PAPER], ms(3033), &mut stats).is_empty());
        let events = r.observe(&[PAPER], ms(3066), &mut stats);

        assert!(matches!(
            events[0],
            RoundEvent::GestureConfirmed { seat: Seat::One, .. }
        ));
        let round = resolved(&events).unwrap();
        assert_eq!(round.player_gesture, Gesture::Paper);
        assert_eq!(round.outcome, Some(Outcome::Win));
        assert_eq!(r.phase(), RoundPhase::Resolved { until: ms(6066) });
    }

    #[test]
    fn test_first_confirmed_ignores_flicker() {
        let mut stats = GameStatistics::new();
        let settings = GameSettings::default().with_policy(ExposurePolicy::FirstConfirmed);
        let mut r = resolver(settings, &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        let cycle = [ROCK, PAPER, SCISSORS];
        for i in 0..60u64 {
            let events = r.observe(&[cycle[i as usize % 3]], ms(3000 + i * 33), &mut stats);
            assert!(resolved(&events).is_none());
        }
        let round = resolved(&r.tick(ms(6000), &mut stats)).cloned().unwrap();
        assert_eq!(round.player_gesture, Gesture::Unknown);
        assert_eq!(round.outcome, Some(Outcome::Loss));
    }

    #[test]
    fn test_start_round_is_idempotent() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Rock]);

        r.start_round(ms(0));
        let phase = r.phase();
        assert!(r.start_round(ms(500)).is_empty());
        assert_eq!(r.phase(), phase);

        r.tick(ms(3000), &mut stats);
        let phase = r.phase();
        assert!(r.start_round(ms(3500)).is_empty());
        assert_eq!(r.phase(), phase);

        r.tick(ms(6000), &mut stats);
        let before = stats.clone();
        let phase = r.phase();
        assert!(r.start_round(ms(6500)).is_empty());
        assert_eq!(r.phase(), phase);
        assert_eq!(stats, before);
        assert_eq!(stats.total_games, 1);
    }

    #[test]
    fn test_returns_to_waiting_after_display() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(6000), &mut stats);
        assert_eq!(r.phase(), RoundPhase::Resolved { until: ms(9000) });
        assert!(r.round().is_some());

        assert_eq!(r.tick(ms(9000), &mut stats), vec![RoundEvent::RoundCleared]);
        assert!(r.is_waiting());
        assert!(r.round().is_none());
        assert_eq!(stats.total_games, 1);
    }

    #[test]
    fn test_late_tick_catches_up() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Rock]);
        r.start_round(ms(0));
        let events = r.tick(ms(10_000), &mut stats);
        assert_eq!(events.len(), 5);
        assert_eq!(events[4], RoundEvent::RoundCleared);
        assert_eq!(stats.total_games, 1);
    }

    #[test]
    fn test_abort_forfeits() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::default(), &[Gesture::Scissors]);

        // Nothing to abort while waiting
        assert!(r.abort(ms(0), &mut stats).is_empty());

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[ROCK], ms(3100), &mut stats);
        let events = r.abort(ms(3200), &mut stats);
        let round = resolved(&events).unwrap();
        assert_eq!(round.player_gesture, Gesture::Unknown);
        assert_eq!(round.outcome, Some(Outcome::Loss));
        assert_eq!(stats.losses, 1);

        // Already resolved: a second abort changes nothing
        assert!(r.abort(ms(3300), &mut stats).is_empty());
        assert_eq!(stats.total_games, 1);
    }

    #[test]
    fn test_multiplayer() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::multiplayer(), &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[SCISSORS, PAPER], ms(5900), &mut stats);
        let round = resolved(&r.tick(ms(6000), &mut stats)).cloned().unwrap();
        assert_eq!(round.player_gesture, Gesture::Scissors);
        assert_eq!(round.opponent_gesture, Some(Gesture::Paper));
        assert_eq!(round.outcome, Some(Outcome::Win));

        // Second hand missing at the end: it forfeits
        r.tick(ms(9000), &mut stats);
        r.start_round(ms(9000));
        r.tick(ms(12000), &mut stats);
        r.observe(&[ROCK], ms(14900), &mut stats);
        let round = resolved(&r.tick(ms(15000), &mut stats)).cloned().unwrap();
        assert_eq!(round.opponent_gesture, Some(Gesture::Unknown));
        assert_eq!(round.outcome, Some(Outcome::Win));
        assert_eq!(stats.best_win_streak, 2);
    }

    #[test]
    fn test_multiplayer_lone_hand_takes_seat_one() {
        let mut stats = GameStatistics::new();
        let mut r = resolver(GameSettings::multiplayer(), &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        r.observe(&[SCISSORS, PAPER], ms(4000), &mut stats);
        // Left hand leaves just before the deadline; the remaining hand is seat one
        r.observe(&[PAPER], ms(5900), &mut stats);
        let round = resolved(&r.tick(ms(6000), &mut stats)).cloned().unwrap();
        assert_eq!(round.player_gesture, Gesture::Paper);
        assert_eq!(round.opponent_gesture, Some(Gesture::Unknown));
        assert_eq!(round.outcome, Some(Outcome::Win));
        assert_eq!(stats.per_gesture_counts.get(Gesture::Paper), 1);
        assert_eq!(stats.per_gesture_counts.get(Gesture::Scissors), 0);
    }

    #[test]
    fn test_multiplayer_first_confirmed_waits_for_both() {
        let mut stats = GameStatistics::new();
        let settings = GameSettings::multiplayer().with_policy(ExposurePolicy::FirstConfirmed);
        let mut r = resolver(settings, &[Gesture::Rock]);

        r.start_round(ms(0));
        r.tick(ms(3000), &mut stats);
        for i in 0..3u64 {
            let events = r.observe(&[ROCK], ms(3000 + i * 33), &mut stats);
            assert!(resolved(&events).is_none());
        }
        let mut round = None;
        for i in 3..6u64 {
            let events = r.observe(&[ROCK, ROCK], ms(3000 + i * 33), &mut stats);
            if let Some(found) = resolved(&events) {
                round = Some(found.clone());
            }
        }
        let round = round.expect("both seats confirmed");
        assert_eq!(round.outcome, Some(Outcome::Draw));
        assert_eq!(stats.draws, 1);
    }

    #[test]
    fn test_scripted_opponent() {
        assert!(ComputerOpponent::scripted(vec![Gesture::Unknown]).is_err());
        let mut opponent =
            ComputerOpponent::scripted(vec![Gesture::Rock, Gesture::Unknown, Gesture::Paper]).unwrap();
        let picks: Vec<_> = (0..4).map(|_| opponent.pick()).collect();
        assert_eq!(
            picks,
            vec![Gesture::Rock, Gesture::Paper, Gesture::Rock, Gesture::Paper]
        );
    }

    #[test]
    fn test_random_opponent_is_seeded() {
        let mut a = ComputerOpponent::random(Some(42));
        let mut b = ComputerOpponent::random(Some(42));
        for _ in 0..20 {
            let g = a.pick();
            assert!(g.is_playable());
            assert_eq!(g, b.pick());
        }
    }
}
