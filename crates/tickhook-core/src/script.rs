#![forbid(unsafe_code)]

//! Keyframe script parsing.
//!
//! A script is a textual, line-oriented resource: one header line, then rows
//! of `tick,buttons,axis_x,axis_y`. Buttons are decimal or `0x`-prefixed
//! hex. Rows are sorted ascending by tick and sparse: a gap means "hold the
//! previous value" (sample-and-hold).
//!
//! Parsing is tolerant by design. A row that fails to parse, or whose tick
//! does not advance past the previously accepted row, is skipped with a
//! warning and parsing continues; a single bad row never costs the rest of
//! the script. The script is parsed once at startup and immutable
//! thereafter.

use tracing::warn;

use crate::error::RowError;
use crate::frame_clock::Tick;
use crate::input::{Buttons, InputFrame};

/// A sparse, timestamped input-state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyframe {
    pub tick: Tick,
    pub input: InputFrame,
}

/// An ordered, strictly-increasing-by-tick keyframe sequence.
#[derive(Debug, Clone, Default)]
pub struct KeyframeScript {
    rows: Vec<Keyframe>,
    skipped: usize,
}

impl KeyframeScript {
    /// Parse a script from its textual form.
    ///
    /// The first line is always treated as the header and skipped. Blank
    /// lines are ignored. Malformed or non-advancing rows are skipped and
    /// counted, never fatal.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut rows: Vec<Keyframe> = Vec::new();
        let mut skipped = 0usize;

        for (index, line) in text.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let prev = rows.last().map(|kf| kf.tick);
            match parse_row(line, prev) {
                Ok(kf) => rows.push(kf),
                Err(err) => {
                    skipped += 1;
                    warn!(row = index + 1, %err, "skipping malformed script row");
                }
            }
        }

        Self { rows, skipped }
    }

    #[must_use]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows rejected during parsing.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }
}

fn parse_row(line: &str, prev: Option<Tick>) -> Result<Keyframe, RowError> {
    let mut fields = line.split(',').map(str::trim);
    let (Some(tick), Some(buttons), Some(axis_x), Some(axis_y), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(RowError::FieldCount(line.split(',').count()));
    };

    let tick: Tick = tick.parse().map_err(|_| RowError::Field {
        field: "tick",
        value: tick.to_string(),
    })?;
    if let Some(prev) = prev {
        if tick <= prev {
            return Err(RowError::NonMonotonic { tick, prev });
        }
    }
    let buttons = parse_buttons(buttons).ok_or_else(|| RowError::Field {
        field: "buttons",
        value: buttons.to_string(),
    })?;
    let axis_x: i32 = axis_x.parse().map_err(|_| RowError::Field {
        field: "axis_x",
        value: axis_x.to_string(),
    })?;
    let axis_y: i32 = axis_y.parse().map_err(|_| RowError::Field {
        field: "axis_y",
        value: axis_y.to_string(),
    })?;

    Ok(Keyframe {
        tick,
        input: InputFrame::new(buttons, axis_x, axis_y),
    })
}

/// Buttons accept decimal or `0x`-prefixed hex; unknown bits are kept.
fn parse_buttons(field: &str) -> Option<Buttons> {
    let raw = if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        field.parse().ok()?
    };
    Some(Buttons::from_bits_retain(raw))
}
