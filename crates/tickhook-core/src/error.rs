#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! Nothing in this pipeline is fatal. The system is an observer bolted onto
//! a process it must never destabilize, so every failure degrades to "skip
//! and continue": a failed channel write drops that payload and retries
//! next tick, a malformed script row is skipped, a stale reference is
//! silently invalidated. The types here exist so those events can be
//! classified and reported, not so they can abort anything.

use thiserror::Error;

use crate::frame_clock::Tick;

/// A write to an external channel failed.
///
/// The payload for this tick is dropped and the write retried next tick
/// with fresh data; there is no backlog and no queueing.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The channel is not currently reachable (not created yet, unmounted).
    #[error("channel unavailable")]
    Unavailable,
}

/// Why a single script row was rejected.
///
/// Rejected rows are skipped and parsing continues; a script never aborts
/// because of one bad row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("expected 4 comma-separated fields, found {0}")]
    FieldCount(usize),
    #[error("unparsable {field} field: {value:?}")]
    Field {
        field: &'static str,
        value: String,
    },
    #[error("keyframe tick {tick} does not advance past previous keyframe at {prev}")]
    NonMonotonic { tick: Tick, prev: Tick },
}
