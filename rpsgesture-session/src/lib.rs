//! Live session plumbing for the gesture game
//!
//! - `capture`: landmark sources and the blocking capture driver
//! - `frames`: latest-wins hand-off from capture to the session
//! - `session`: the async event loop that owns all game state
//! - `records`: round log and statistics snapshots

pub mod capture;
pub mod frames;
pub mod records;
pub mod session;

pub use capture::{spawn_capture, CaptureError, CaptureHandle, LandmarkSource, ScriptStep, ScriptedSource};
pub use frames::{frame_channel, CapturedFrame, FrameContent, FrameReceiver, FrameSender};
pub use records::{
    append_record, load_snapshot, read_records, save_snapshot, RecordSink, RoundRecord,
};
pub use session::{play_rounds, PlayReport, Session, SessionCommand, SessionEvent};
