#![forbid(unsafe_code)]

//! File-backed external channels.
//!
//! Three channel shapes, all deliberately dumb:
//!
//! - [`StatusFile`]: the status block, one fixed-size record overwritten at
//!   offset 0 every tick.
//! - [`LiveInputFile`]: the live input blob, a 16-byte record polled (not
//!   pushed); writer and reader synchronize no further than "latest write
//!   wins".
//! - [`LogStream`]: one append-only byte stream per name, written at the
//!   logical offset its [`RingLogger`](tickhook_core::RingLogger) tracks.
//!
//! Channel write failures surface as [`ChannelError`] and the caller drops
//! the payload; nothing here retries or queues.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tickhook_core::status::{STATUS_BLOCK_LEN, StatusSink};
use tickhook_core::{Buttons, ChannelError, InputFrame, LogSink};

/// Size of the live input blob: buttons u64, axis_x i32, axis_y i32, LE.
pub const LIVE_INPUT_LEN: usize = 16;

/// The status channel as a file overwritten in place.
#[derive(Debug)]
pub struct StatusFile {
    file: File,
}

impl StatusFile {
    /// Create (or truncate) the status file and fix its size to one block,
    /// so pollers can start reading immediately.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(STATUS_BLOCK_LEN as u64)?;
        Ok(Self { file })
    }
}

impl StatusSink for StatusFile {
    fn publish(&mut self, block: &[u8; STATUS_BLOCK_LEN]) -> Result<(), ChannelError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(block)?;
        Ok(())
    }
}

/// The live input channel, polled at a sub-multiple of the tick rate.
#[derive(Debug)]
pub struct LiveInputFile {
    path: PathBuf,
}

impl LiveInputFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the latest sample. `None` if the file is absent or short; the
    /// caller retains its previous sample on any failure.
    #[must_use]
    pub fn poll(&self) -> Option<InputFrame> {
        let mut file = File::open(&self.path).ok()?;
        let mut buf = [0u8; LIVE_INPUT_LEN];
        file.read_exact(&mut buf).ok()?;
        Some(decode_live_input(&buf))
    }
}

/// Decode the 16-byte live input blob.
#[must_use]
pub fn decode_live_input(buf: &[u8; LIVE_INPUT_LEN]) -> InputFrame {
    let buttons = u64::from_le_bytes(buf[0..8].try_into().unwrap_or([0; 8]));
    let axis_x = i32::from_le_bytes(buf[8..12].try_into().unwrap_or([0; 4]));
    let axis_y = i32::from_le_bytes(buf[12..16].try_into().unwrap_or([0; 4]));
    InputFrame::new(Buttons::from_bits_retain(buttons), axis_x, axis_y)
}

/// Encode a live input blob. The writer side lives outside this process;
/// this exists for tools and tests.
#[must_use]
pub fn encode_live_input(frame: InputFrame) -> [u8; LIVE_INPUT_LEN] {
    let mut buf = [0u8; LIVE_INPUT_LEN];
    buf[0..8].copy_from_slice(&frame.buttons.bits().to_le_bytes());
    buf[8..12].copy_from_slice(&frame.axis_x.to_le_bytes());
    buf[12..16].copy_from_slice(&frame.axis_y.to_le_bytes());
    buf
}

/// One append-only log stream backed by a file.
#[derive(Debug)]
pub struct LogStream {
    file: File,
}

impl LogStream {
    /// Create (or truncate) the stream file. Truncation matters: leftover
    /// bytes from a previous run would corrupt the stream for readers.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl LogSink for LogStream {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ChannelError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }
}
