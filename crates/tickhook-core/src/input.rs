#![forbid(unsafe_code)]

//! Controller input state and the synthetic/real merge policy.

use bitflags::bitflags;

bitflags! {
    /// Controller button bitmask, matching the host's input record.
    ///
    /// Unknown bits are preserved as-is through parsing and merging so a
    /// script can drive buttons this table has no name for yet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u64 {
        const A       = 0x01;
        const B       = 0x02;
        const X       = 0x04;
        const Y       = 0x08;
        const L_STICK = 0x10;
        const R_STICK = 0x20;
        const L       = 0x40;
        const R       = 0x80;
        const ZL      = 0x100;
        const ZR      = 0x200;
        const PLUS    = 0x400;
        const MINUS   = 0x800;
        const LEFT    = 0x1000;
        const UP      = 0x2000;
        const RIGHT   = 0x4000;
        const DOWN    = 0x8000;
    }
}

/// One frame of controller input: buttons plus the left stick.
///
/// Axis values range -32768..=32767 with 0 centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFrame {
    pub buttons: Buttons,
    pub axis_x: i32,
    pub axis_y: i32,
}

impl InputFrame {
    /// No buttons, sticks centered.
    pub const NEUTRAL: InputFrame = InputFrame {
        buttons: Buttons::empty(),
        axis_x: 0,
        axis_y: 0,
    };

    #[must_use]
    pub const fn new(buttons: Buttons, axis_x: i32, axis_y: i32) -> Self {
        Self {
            buttons,
            axis_x,
            axis_y,
        }
    }

    /// Merge this synthetic frame over the host's real input.
    ///
    /// Buttons are OR-combined. Each stick axis is overridden only when the
    /// synthetic value is nonzero: zero means "no opinion", and the real
    /// input passes through. Applied every tick regardless of injector
    /// mode.
    #[must_use]
    pub fn merge_over(self, real: InputFrame) -> InputFrame {
        InputFrame {
            buttons: real.buttons | self.buttons,
            axis_x: if self.axis_x != 0 { self.axis_x } else { real.axis_x },
            axis_y: if self.axis_y != 0 { self.axis_y } else { real.axis_y },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_or_combine() {
        let real = InputFrame::new(Buttons::A, 0, 0);
        let synthetic = InputFrame::new(Buttons::RIGHT, 0, 0);
        let merged = synthetic.merge_over(real);
        assert_eq!(merged.buttons.bits(), 0x4001);
    }

    #[test]
    fn zero_synthetic_axis_defers_to_real() {
        let real = InputFrame::new(Buttons::empty(), 500, -200);
        let merged = InputFrame::NEUTRAL.merge_over(real);
        assert_eq!(merged.axis_x, 500);
        assert_eq!(merged.axis_y, -200);
    }

    #[test]
    fn nonzero_synthetic_axis_overrides_real() {
        let real = InputFrame::new(Buttons::empty(), 500, 500);
        let synthetic = InputFrame::new(Buttons::empty(), -32768, 0);
        let merged = synthetic.merge_over(real);
        assert_eq!(merged.axis_x, -32768);
        assert_eq!(merged.axis_y, 500);
    }

    #[test]
    fn unknown_button_bits_survive() {
        let synthetic = InputFrame::new(Buttons::from_bits_retain(0x1_0000), 0, 0);
        let merged = synthetic.merge_over(InputFrame::NEUTRAL);
        assert_eq!(merged.buttons.bits(), 0x1_0000);
    }
}
