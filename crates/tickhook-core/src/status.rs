#![forbid(unsafe_code)]

//! The externally published status snapshot.
//!
//! A fixed-layout 64-byte little-endian block, overwritten in place at a
//! well-known location once per tick, unconditionally. Writing even when
//! nothing changed lets a polling reader distinguish "frozen" (tick not
//! advancing) from "idle" (tick advancing, mode Unknown).
//!
//! # Layout, version 2
//!
//! ```text
//! 0x00  u32  version (=2)
//! 0x04  u32  entity_valid (0/1)
//! 0x08  u64  tick
//! 0x10  u32  mode
//! 0x14  i32  raw_phase (-1 when never read)
//! 0x18  u32  discrete_state
//! 0x1C  u32  state_age_ticks
//! 0x20  u32  variant_id
//! 0x24  u32  raw_flags (bit 0 = in_water)
//! 0x28  f32  pos_x
//! 0x2C  f32  pos_y
//! 0x30  f32  vel_x
//! 0x34  f32  vel_y
//! 0x38  u64  reserved (=0)
//! ```
//!
//! Version 1 was a 32-byte block without the validity and mode fields.
//! Consumers must check the version and treat unrecognized trailing bytes
//! as reserved; more than one layout can be live across deployments.
//!
//! Invariant: `entity_valid == 0` implies every entity-derived field is
//! zero. A reader never sees a previous tick's values behind a cleared
//! validity flag, and never sees a partially updated snapshot.

use tracing::warn;

use crate::classifier::Mode;
use crate::error::ChannelError;
use crate::frame_clock::Tick;

/// Size of the encoded status block.
pub const STATUS_BLOCK_LEN: usize = 64;

/// Current layout version.
pub const STATUS_VERSION: u32 = 2;

/// Immutable-per-tick snapshot of the pipeline's view of the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSnapshot {
    pub tick: Tick,
    pub mode: Mode,
    pub entity_valid: bool,
    pub raw_phase: i32,
    pub discrete_state: u32,
    pub state_age_ticks: u32,
    pub variant_id: u32,
    pub raw_flags: u32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl StatusSnapshot {
    /// A snapshot with no valid entity: every entity-derived field zeroed.
    #[must_use]
    pub fn without_entity(tick: Tick, mode: Mode, raw_phase: i32) -> Self {
        Self {
            tick,
            mode,
            entity_valid: false,
            raw_phase,
            ..Self::default()
        }
    }

    /// True when all entity-derived fields hold their zero value.
    #[must_use]
    pub fn entity_fields_zeroed(&self) -> bool {
        self.discrete_state == 0
            && self.state_age_ticks == 0
            && self.variant_id == 0
            && self.raw_flags == 0
            && self.pos_x == 0.0
            && self.pos_y == 0.0
            && self.vel_x == 0.0
            && self.vel_y == 0.0
    }

    /// Encode to the version-2 wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; STATUS_BLOCK_LEN] {
        let mut b = [0u8; STATUS_BLOCK_LEN];
        b[0x00..0x04].copy_from_slice(&STATUS_VERSION.to_le_bytes());
        b[0x04..0x08].copy_from_slice(&u32::from(self.entity_valid).to_le_bytes());
        b[0x08..0x10].copy_from_slice(&self.tick.to_le_bytes());
        b[0x10..0x14].copy_from_slice(&self.mode.code().to_le_bytes());
        b[0x14..0x18].copy_from_slice(&self.raw_phase.to_le_bytes());
        b[0x18..0x1C].copy_from_slice(&self.discrete_state.to_le_bytes());
        b[0x1C..0x20].copy_from_slice(&self.state_age_ticks.to_le_bytes());
        b[0x20..0x24].copy_from_slice(&self.variant_id.to_le_bytes());
        b[0x24..0x28].copy_from_slice(&self.raw_flags.to_le_bytes());
        b[0x28..0x2C].copy_from_slice(&self.pos_x.to_le_bytes());
        b[0x2C..0x30].copy_from_slice(&self.pos_y.to_le_bytes());
        b[0x30..0x34].copy_from_slice(&self.vel_x.to_le_bytes());
        b[0x34..0x38].copy_from_slice(&self.vel_y.to_le_bytes());
        // 0x38..0x40 reserved, zero.
        b
    }

    /// Decode a version-2 block. Returns `None` on a short buffer, an
    /// unknown version, or an unknown mode code.
    #[must_use]
    pub fn decode(block: &[u8]) -> Option<Self> {
        if block.len() < STATUS_BLOCK_LEN {
            return None;
        }
        let u32_at = |off: usize| -> Option<u32> {
            Some(u32::from_le_bytes(block[off..off + 4].try_into().ok()?))
        };
        if u32_at(0x00)? != STATUS_VERSION {
            return None;
        }
        let mode = Mode::from_code(u32_at(0x10)?)?;
        Some(Self {
            tick: u64::from_le_bytes(block[0x08..0x10].try_into().ok()?),
            mode,
            entity_valid: u32_at(0x04)? != 0,
            raw_phase: i32::from_le_bytes(block[0x14..0x18].try_into().ok()?),
            discrete_state: u32_at(0x18)?,
            state_age_ticks: u32_at(0x1C)?,
            variant_id: u32_at(0x20)?,
            raw_flags: u32_at(0x24)?,
            pos_x: f32::from_le_bytes(block[0x28..0x2C].try_into().ok()?),
            pos_y: f32::from_le_bytes(block[0x2C..0x30].try_into().ok()?),
            vel_x: f32::from_le_bytes(block[0x30..0x34].try_into().ok()?),
            vel_y: f32::from_le_bytes(block[0x34..0x38].try_into().ok()?),
        })
    }
}

/// The external status channel: one fixed-size record overwritten in place.
pub trait StatusSink {
    fn publish(&mut self, block: &[u8; STATUS_BLOCK_LEN]) -> Result<(), ChannelError>;
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn publish(&mut self, block: &[u8; STATUS_BLOCK_LEN]) -> Result<(), ChannelError> {
        (**self).publish(block)
    }
}

/// Publishes one snapshot per tick, dropping (never queueing) on failure.
pub struct StatusPublisher<S: StatusSink> {
    sink: S,
    published: u64,
    dropped: u64,
}

impl<S: StatusSink> StatusPublisher<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            published: 0,
            dropped: 0,
        }
    }

    /// Write the snapshot to the channel. Must never block beyond the one
    /// synchronous write; on failure the snapshot is dropped and the next
    /// tick publishes fresh data instead.
    pub fn publish(&mut self, snapshot: &StatusSnapshot) {
        debug_assert!(
            snapshot.entity_valid || snapshot.entity_fields_zeroed(),
            "invalid snapshot must carry zeroed entity fields"
        );
        match self.sink.publish(&snapshot.encode()) {
            Ok(()) => self.published += 1,
            Err(err) => {
                self.dropped += 1;
                warn!(%err, tick = snapshot.tick, "status snapshot dropped");
            }
        }
    }

    /// Snapshots successfully written.
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Snapshots dropped on channel write failure.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
