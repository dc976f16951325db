#![forbid(unsafe_code)]

//! Input injection: resolving the current synthetic input each tick.
//!
//! Two mutually exclusive sources, selected once at startup by presence of
//! a script resource:
//!
//! - **Script mode**: a parsed [`KeyframeScript`] replayed sample-and-hold.
//!   Each tick the cursor consumes every keyframe at or before the current
//!   tick, last one wins, and never rewinds. Playback goes idle once the
//!   cursor is exhausted and the held buttons are all-zero; a nonzero
//!   trailing hold keeps injecting forever.
//! - **Live mode**: an external sample polled every `poll_interval` ticks.
//!   A failed poll retains the previous sample unchanged; synthetic input
//!   never snaps to zero on a transient read failure.
//!
//! Whatever the source, [`merge`](InputInjector::merge) applies the §-policy
//! of [`InputFrame::merge_over`] to the host's real input every tick.

use tracing::debug;

use crate::frame_clock::Tick;
use crate::input::InputFrame;
use crate::script::KeyframeScript;

#[derive(Debug)]
enum Source {
    Script {
        script: KeyframeScript,
        cursor: usize,
        active: bool,
    },
    Live {
        poll_interval: u64,
    },
}

/// Per-tick synthetic input resolution and merging.
#[derive(Debug)]
pub struct InputInjector {
    source: Source,
    current: InputFrame,
}

impl InputInjector {
    /// Script-mode injector. An empty script starts (and stays) idle.
    #[must_use]
    pub fn from_script(script: KeyframeScript) -> Self {
        let active = !script.is_empty();
        Self {
            source: Source::Script {
                script,
                cursor: 0,
                active,
            },
            current: InputFrame::NEUTRAL,
        }
    }

    /// Live-mode injector polling every `poll_interval` ticks (min 1).
    #[must_use]
    pub fn live(poll_interval: u64) -> Self {
        Self {
            source: Source::Live {
                poll_interval: poll_interval.max(1),
            },
            current: InputFrame::NEUTRAL,
        }
    }

    /// Whether this injector polls a live source (as opposed to replaying
    /// a script). Fixed for the injector's lifetime.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live { .. })
    }

    /// Whether the injector still has an opinion. Live mode is always
    /// active; script mode deactivates on idle and never reactivates.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.source {
            Source::Script { active, .. } => active,
            Source::Live { .. } => true,
        }
    }

    /// The synthetic input that would be merged this tick.
    #[must_use]
    pub const fn synthetic(&self) -> InputFrame {
        self.current
    }

    /// Advance the script cursor to `tick`. No-op in live mode.
    pub fn advance(&mut self, tick: Tick) {
        let Source::Script {
            script,
            cursor,
            active,
        } = &mut self.source
        else {
            return;
        };
        if !*active {
            return;
        }
        let rows = script.keyframes();
        while *cursor < rows.len() && rows[*cursor].tick <= tick {
            self.current = rows[*cursor].input;
            *cursor += 1;
        }
        if *cursor >= rows.len() && self.current.buttons.is_empty() {
            *active = false;
            debug!(tick, "script playback complete; injector idle");
        }
    }

    /// Whether the live source should be polled this tick.
    #[must_use]
    pub fn needs_poll(&self, tick: Tick) -> bool {
        match self.source {
            Source::Live { poll_interval } => tick % poll_interval == 0,
            Source::Script { .. } => false,
        }
    }

    /// Replace the current synthetic input with a freshly polled sample.
    ///
    /// Callers only invoke this on a successful poll; on failure the
    /// previous sample simply stays in place.
    pub fn supply_sample(&mut self, sample: InputFrame) {
        debug_assert!(matches!(self.source, Source::Live { .. }));
        self.current = sample;
    }

    /// Merge the current synthetic input over the host's real input.
    ///
    /// An idle injector passes the real input through untouched.
    #[must_use]
    pub fn merge(&self, real: InputFrame) -> InputFrame {
        if !self.is_active() {
            return real;
        }
        self.current.merge_over(real)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Buttons;

    fn script(text: &str) -> KeyframeScript {
        KeyframeScript::parse(text)
    }

    #[test]
    fn sample_and_hold_replay() {
        let mut inj = InputInjector::from_script(script(
            "h\n0,0,0,0\n100,0x4000,0,0\n120,0x4001,0,0\n",
        ));
        for tick in 0..=99 {
            inj.advance(tick);
            assert_eq!(inj.synthetic().buttons.bits(), 0, "tick {tick}");
        }
        for tick in 100..=119 {
            inj.advance(tick);
            assert_eq!(inj.synthetic().buttons.bits(), 0x4000, "tick {tick}");
        }
        for tick in 120..300 {
            inj.advance(tick);
            assert_eq!(inj.synthetic().buttons.bits(), 0x4001, "tick {tick}");
        }
        // Nonzero trailing hold keeps injecting forever.
        assert!(inj.is_active());
    }

    #[test]
    fn multiple_past_keyframes_last_one_wins() {
        let mut inj = InputInjector::from_script(script("h\n1,0x01,0,0\n2,0x02,0,0\n3,0x04,0,0\n"));
        inj.advance(10);
        assert_eq!(inj.synthetic().buttons.bits(), 0x04);
    }

    #[test]
    fn zero_tail_goes_idle() {
        let mut inj = InputInjector::from_script(script("h\n0,0x01,0,0\n10,0,0,0\n"));
        inj.advance(5);
        assert!(inj.is_active());
        inj.advance(10);
        assert!(!inj.is_active());
        // Idle injector passes real input through.
        let real = InputFrame::new(Buttons::B, 7, 7);
        assert_eq!(inj.merge(real), real);
    }

    #[test]
    fn empty_script_never_activates() {
        let inj = InputInjector::from_script(script("h\n"));
        assert!(!inj.is_active());
    }

    #[test]
    fn script_merge_combines_with_real() {
        let mut inj = InputInjector::from_script(script("h\n0,0x4000,0,0\n"));
        inj.advance(0);
        let merged = inj.merge(InputFrame::new(Buttons::A, 500, 0));
        assert_eq!(merged.buttons.bits(), 0x4001);
        assert_eq!(merged.axis_x, 500);
    }

    #[test]
    fn live_poll_cadence() {
        let inj = InputInjector::live(2);
        assert!(inj.needs_poll(0));
        assert!(!inj.needs_poll(1));
        assert!(inj.needs_poll(2));
    }

    #[test]
    fn live_retains_sample_between_polls() {
        let mut inj = InputInjector::live(2);
        inj.supply_sample(InputFrame::new(Buttons::RIGHT, 0, 0));
        // No fresh sample arrives; the old one keeps merging.
        let merged = inj.merge(InputFrame::NEUTRAL);
        assert_eq!(merged.buttons, Buttons::RIGHT);
        assert!(inj.is_active());
    }
}
