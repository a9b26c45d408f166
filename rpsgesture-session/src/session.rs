//! Game session loop
//!
//! Level 1 - Orchestration: `play_rounds` wires capture, session and commands
//! Level 2 - Event loop: `Session::run`
//! Level 3 - Frame and timer handling
//!
//! All game state lives on the session task. Capture publishes frames through
//! the latest-wins channel, the presentation layer sends commands and reads
//! events, and one interval timer drives the round phases.

use std::time::Duration;

use rpsgesture_core::{
    order_left_to_right, ClassificationResult, Classifier, GameSettings, GameStatistics,
    GestureClassifier, Round, RoundEvent, RoundResolver,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::capture::{spawn_capture, LandmarkSource};
use crate::frames::{frame_channel, CapturedFrame, FrameContent, FrameReceiver};
use crate::records::RecordSink;

/// Requests from the presentation layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a round (ignored unless waiting)
    StartRound,
    /// Reset statistics
    NewGame,
    /// Stop the session
    Shutdown,
}

/// Notifications for the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Per-frame classifications, one per visible hand in seat order
    HandsClassified(Vec<ClassificationResult>),
    Round(RoundEvent),
    /// Statistics after a round resolves or a new game starts
    Statistics(GameStatistics),
    /// A frame could not be read
    CaptureFailed(String),
    /// Capture has ended; later rounds see no hands
    CaptureStopped,
}

/// Shortest timer period the session will use
const MIN_POLL: Duration = Duration::from_millis(1);

/// Owns the resolver, classifier and statistics for one session
pub struct Session {
    classifier: Classifier,
    resolver: RoundResolver,
    stats: GameStatistics,
    sink: RecordSink,
    /// Last record write, still running on the blocking pool
    pending_write: Option<JoinHandle<()>>,
    poll_interval: Duration,
    epoch: Instant,
}

impl Session {
    pub fn new(settings: &GameSettings, classifier: Classifier) -> anyhow::Result<Self> {
        let resolver = RoundResolver::from_settings(settings)?;
        let poll_interval = settings
            .frame_interval()
            .min(settings.timing.tick_interval)
            .max(MIN_POLL);
        Ok(Self {
            classifier,
            resolver,
            stats: GameStatistics::new(),
            sink: RecordSink::new(),
            pending_write: None,
            poll_interval,
            epoch: Instant::now(),
        })
    }

    /// Resume from earlier statistics
    pub fn with_statistics(mut self, stats: GameStatistics) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_sink(mut self, sink: RecordSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn statistics(&self) -> &GameStatistics {
        &self.stats
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    // ========================================================================
    // EVENT LOOP
    // ========================================================================

    /// Run until `Shutdown` or until every command sender is dropped.
    ///
    /// Returns the final statistics. Losing capture does not end the session:
    /// an active round is forfeited and later rounds resolve with no hands.
    pub async fn run(
        mut self,
        mut frames: FrameReceiver,
        mut commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Sender<SessionEvent>,
    ) -> anyhow::Result<GameStatistics> {
        self.epoch = Instant::now();
        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture_open = true;

        tracing::info!("Session started ({})", self.stats.scoreboard());

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let now = self.now();
                    let round_events = self.resolver.tick(now, &mut self.stats);
                    self.dispatch(round_events, &events).await;
                }
                frame = frames.next(), if capture_open => match frame {
                    Some(frame) => self.handle_frame(frame, &events).await,
                    None => {
                        capture_open = false;
                        tracing::warn!("Capture stopped");
                        let now = self.now();
                        let round_events = self.resolver.abort(now, &mut self.stats);
                        send(&events, SessionEvent::CaptureStopped).await;
                        self.dispatch(round_events, &events).await;
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::StartRound) => {
                        let now = self.now();
                        let round_events = self.resolver.start_round(now);
                        self.dispatch(round_events, &events).await;
                    }
                    Some(SessionCommand::NewGame) => {
                        tracing::info!("New game");
                        self.stats.reset();
                        send(&events, SessionEvent::Statistics(self.stats.clone())).await;
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
            }
        }

        self.flush_records().await;
        tracing::info!(
            "Session ended after {} rounds ({})",
            self.resolver.rounds_played(),
            self.stats.scoreboard()
        );
        Ok(self.stats)
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    async fn handle_frame(&mut self, frame: CapturedFrame, events: &mpsc::Sender<SessionEvent>) {
        let results = match frame.content {
            FrameContent::Hands(mut hands) => {
                order_left_to_right(&mut hands);
                let results: Vec<ClassificationResult> = hands
                    .iter()
                    .take(self.resolver.mode().seats())
                    .map(|hand| self.classifier.classify(hand))
                    .collect();
                send(events, SessionEvent::HandsClassified(results.clone())).await;
                results
            }
            FrameContent::Failed(err) => {
                tracing::debug!("Frame {} failed: {}", frame.sequence, err);
                send(events, SessionEvent::CaptureFailed(err.to_string())).await;
                Vec::new()
            }
        };

        let now = self.now();
        let round_events = self.resolver.observe(&results, now, &mut self.stats);
        self.dispatch(round_events, events).await;
    }

    /// Forward round events, persisting and publishing statistics on resolve
    async fn dispatch(&mut self, round_events: Vec<RoundEvent>, events: &mpsc::Sender<SessionEvent>) {
        for event in round_events {
            let resolved = matches!(event, RoundEvent::RoundResolved(_));
            if let RoundEvent::RoundResolved(round) = &event {
                self.persist(round).await;
            }
            send(events, SessionEvent::Round(event)).await;
            if resolved {
                send(events, SessionEvent::Statistics(self.stats.clone())).await;
            }
        }
    }
}

impl Session {
    // ========================================================================
    // RECORDS
    // ========================================================================

    /// Write the round on the blocking pool so file I/O never delays timers.
    /// Writes stay in round order: each waits for the previous one.
    async fn persist(&mut self, round: &Round) {
        if self.sink.is_empty() {
            return;
        }
        self.flush_records().await;

        let sink = self.sink.clone();
        let number = self.resolver.rounds_played();
        let round = round.clone();
        let stats = self.stats.clone();
        self.pending_write = Some(tokio::task::spawn_blocking(move || {
            sink.write(number, &round, &stats)
        }));
    }

    async fn flush_records(&mut self) {
        if let Some(task) = self.pending_write.take() {
            if let Err(err) = task.await {
                tracing::warn!("Record writer failed: {}", err);
            }
        }
    }
}

/// Deliver an event; a departed presentation layer is not an error
async fn send(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if events.send(event).await.is_err() {
        tracing::trace!("Event receiver closed");
    }
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Summary of a scripted run
#[derive(Clone, Debug, PartialEq)]
pub struct PlayReport {
    pub rounds: Vec<Round>,
    pub statistics: GameStatistics,
    pub capture_failures: u32,
    /// Whether capture ended before the last round did
    pub capture_stopped: bool,
}

/// Play `rounds` rounds back to back against `source`.
///
/// Starts each round as soon as the previous one clears, then shuts the
/// session down.
pub async fn play_rounds<S>(
    session: Session,
    source: S,
    capture_interval: Duration,
    rounds: usize,
) -> anyhow::Result<PlayReport>
where
    S: LandmarkSource + 'static,
{
    let (frame_tx, frame_rx) = frame_channel();
    let capture = spawn_capture(source, capture_interval, frame_tx);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let task = tokio::spawn(session.run(frame_rx, command_rx, event_tx));

    let mut report = PlayReport {
        rounds: Vec::new(),
        statistics: GameStatistics::new(),
        capture_failures: 0,
        capture_stopped: false,
    };

    if rounds > 0 {
        command_tx.send(SessionCommand::StartRound).await?;
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Round(RoundEvent::RoundResolved(round)) => {
                    tracing::info!(
                        "Round {}: {} vs {} -> {}",
                        report.rounds.len() + 1,
                        round.player_gesture,
                        round
                            .opponent_gesture
                            .map_or("-".to_string(), |g| g.to_string()),
                        round.outcome.map_or("-".to_string(), |o| o.to_string())
                    );
                    report.rounds.push(round);
                }
                SessionEvent::Round(RoundEvent::RoundCleared) => {
                    if report.rounds.len() >= rounds {
                        break;
                    }
                    command_tx.send(SessionCommand::StartRound).await?;
                }
                SessionEvent::CaptureFailed(_) => report.capture_failures += 1,
                SessionEvent::CaptureStopped => report.capture_stopped = true,
                _ => {}
            }
        }
    }

    // Close the event side first so the session never blocks on a full queue
    drop(event_rx);
    command_tx.send(SessionCommand::Shutdown).await.ok();
    capture.stop();

    report.statistics = task.await??;
    capture.join().await?;
    Ok(report)
}
