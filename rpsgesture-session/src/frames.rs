//! Latest-wins frame hand-off between the capture driver and the session
//!
//! The capture side overwrites a single slot; the session only ever sees the
//! newest frame. Frames published while the session is busy are dropped, so a
//! slow consumer never builds a backlog. Dropping the sender tells the session
//! that capture has stopped.

use rpsgesture_core::LandmarkSet;
use tokio::sync::watch;

use crate::capture::CaptureError;

/// What one capture poll produced
#[derive(Clone, Debug, PartialEq)]
pub enum FrameContent {
    /// Detected hands, in detector order (possibly none)
    Hands(Vec<LandmarkSet>),
    /// The camera or detector failed for this poll
    Failed(CaptureError),
}

/// A published frame
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedFrame {
    /// Monotonic per-driver counter
    pub sequence: u64,
    pub content: FrameContent,
}

/// Create a connected sender/receiver pair
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = watch::channel(None);
    (
        FrameSender { tx, sequence: 0 },
        FrameReceiver { rx },
    )
}

/// Capture side of the hand-off
#[derive(Debug)]
pub struct FrameSender {
    tx: watch::Sender<Option<CapturedFrame>>,
    sequence: u64,
}

impl FrameSender {
    /// Replace whatever frame is pending. Returns the sequence number used.
    pub fn publish(&mut self, content: FrameContent) -> u64 {
        self.sequence += 1;
        let frame = CapturedFrame {
            sequence: self.sequence,
            content,
        };
        self.tx.send_replace(Some(frame));
        self.sequence
    }

    /// True once the receiving session has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Session side of the hand-off
#[derive(Debug)]
pub struct FrameReceiver {
    rx: watch::Receiver<Option<CapturedFrame>>,
}

impl FrameReceiver {
    /// Wait for a frame newer than the last one returned.
    ///
    /// Returns `None` once the sender is dropped and the final frame has
    /// been consumed.
    pub async fn next(&mut self) -> Option<CapturedFrame> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}
