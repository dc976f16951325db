#![forbid(unsafe_code)]

//! Bounded per-stream log buffering.
//!
//! Each named stream owns a [`RingLogger`]: a fixed-capacity byte buffer in
//! front of an append-only external channel. Records accumulate in memory
//! and reach the channel on [`flush`](RingLogger::flush), which the caller
//! invokes on a cadence; an append that would overflow flushes first, and a
//! single record at least as large as the whole buffer bypasses it and goes
//! straight to the channel at the current logical offset.
//!
//! # Conservation
//!
//! While the sink keeps accepting writes, `logical offset + buffered bytes`
//! always equals total bytes appended: no record is double-written or
//! skipped, including across the direct-write bypass. When a sink write
//! fails the affected payload is dropped (counted, warned) and the stream
//! keeps running; freshness beats completeness everywhere in this system.

use std::fmt;

use tracing::warn;

use crate::error::ChannelError;

/// Default per-stream buffer capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 8192;

/// Append-only byte channel with positioned writes.
///
/// `offset` is the stream's logical offset: implementations write `data`
/// starting there. One sink per named stream, each independently
/// offset-tracked.
pub trait LogSink {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ChannelError>;
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ChannelError> {
        (**self).write_at(offset, data)
    }
}

/// Plain in-memory sink. Useful for tests and for consumers that want to
/// capture a stream without touching a filesystem.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl LogSink for MemorySink {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ChannelError> {
        let offset = offset as usize;
        if self.data.len() < offset + data.len() {
            self.data.resize(offset + data.len(), 0);
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Fixed-capacity buffer in front of one append-only stream.
pub struct RingLogger<S: LogSink> {
    sink: S,
    buf: Vec<u8>,
    capacity: usize,
    offset: u64,
    accepted: u64,
    dropped: u64,
}

impl<S: LogSink> RingLogger<S> {
    /// A logger with the given buffer capacity (min 1 byte).
    #[must_use]
    pub fn new(sink: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sink,
            buf: Vec::with_capacity(capacity),
            capacity,
            offset: 0,
            accepted: 0,
            dropped: 0,
        }
    }

    /// A logger with [`DEFAULT_LOG_CAPACITY`].
    #[must_use]
    pub fn with_default_capacity(sink: S) -> Self {
        Self::new(sink, DEFAULT_LOG_CAPACITY)
    }

    /// Append one record. Ownership of the bytes transfers to the stream:
    /// they will reach the channel on a later flush (or immediately, for a
    /// record at least as large as the whole buffer).
    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.accepted += data.len() as u64;

        // Preserve ordering: anything already buffered must reach the
        // channel before this record does.
        if self.buf.len() + data.len() > self.capacity {
            self.flush();
        }

        if data.len() >= self.capacity {
            match self.sink.write_at(self.offset, data) {
                Ok(()) => self.offset += data.len() as u64,
                Err(err) => {
                    self.dropped += data.len() as u64;
                    warn!(%err, len = data.len(), "oversize record dropped on write failure");
                }
            }
            return;
        }

        self.buf.extend_from_slice(data);
    }

    /// Append a formatted record, `writef`-style.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        use fmt::Write;
        let mut line = String::new();
        if line.write_fmt(args).is_ok() {
            self.append(line.as_bytes());
        }
    }

    /// Write all buffered bytes at the logical offset and reset the buffer.
    /// No-op when the buffer is empty. On failure the buffered payload is
    /// dropped; the offset does not advance.
    pub fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        match self.sink.write_at(self.offset, &self.buf) {
            Ok(()) => self.offset += self.buf.len() as u64,
            Err(err) => {
                self.dropped += self.buf.len() as u64;
                warn!(%err, len = self.buf.len(), "buffered log payload dropped on flush failure");
            }
        }
        self.buf.clear();
    }

    /// Bytes already written to the channel.
    #[must_use]
    pub const fn logical_offset(&self) -> u64 {
        self.offset
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes ever accepted by [`append`](Self::append).
    #[must_use]
    pub const fn total_accepted(&self) -> u64 {
        self.accepted
    }

    /// Bytes dropped because of channel write failures.
    #[must_use]
    pub const fn total_dropped(&self) -> u64 {
        self.dropped
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: LogSink> fmt::Debug for RingLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingLogger")
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .field("buffered", &self.buf.len())
            .field("accepted", &self.accepted)
            .field("dropped", &self.dropped)
            .finish()
    }
}
