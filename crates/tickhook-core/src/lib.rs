#![forbid(unsafe_code)]

//! Core: frame clock, scene classification, input injection, and ring logging.
//!
//! Everything in this crate is host-agnostic and IO-free. External channels
//! (the status block, the live input blob, the per-stream log files) appear
//! only as sink/source traits; `tickhook-runtime` supplies the file-backed
//! implementations and the wiring to a live host process.
//!
//! The crate assumes the host's single-threaded cooperative model: one caller
//! context re-enters the tick entry point once per simulation step, never
//! concurrently or reentrantly. Nothing here locks.

pub mod classifier;
pub mod entity;
pub mod error;
pub mod frame_clock;
pub mod injector;
pub mod input;
pub mod ring_log;
pub mod script;
pub mod status;

pub use classifier::{Mode, ModeChange, SceneClassifier, TransitionEvent, state};
pub use entity::{EntityRef, EntityTracker};
pub use error::{ChannelError, RowError};
pub use frame_clock::{FrameClock, Tick};
pub use injector::InputInjector;
pub use input::{Buttons, InputFrame};
pub use ring_log::{DEFAULT_LOG_CAPACITY, LogSink, RingLogger};
pub use script::{Keyframe, KeyframeScript};
pub use status::{
    STATUS_BLOCK_LEN, STATUS_VERSION, StatusPublisher, StatusSink, StatusSnapshot,
};
