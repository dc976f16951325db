#![forbid(unsafe_code)]

//! Scene classifier: high-level mode derived from noisy transition events.
//!
//! The host exposes no "what screen am I on" API. What it does expose, at an
//! interception point, is the subject's discrete state-machine transitions as
//! `(old_state, new_state)` pairs. A small set of canonical edges in that
//! event vocabulary reliably marks mode boundaries; everything else is noise
//! and leaves the mode unchanged.
//!
//! An independently read coarse phase value is recorded for diagnostics only.
//! It cannot distinguish edit mode from in-editor test play, so it never
//! forces a mode change.
//!
//! # Precedence
//!
//! If more than one edge rule matches a single event, the more specific
//! signal wins: death and goal entry beat the generic reset edge. The event
//! is counted and logged as ambiguous rather than guessed past. A transition
//! sequence outside the taught vocabulary leaves the mode unchanged; that is
//! a gap to extend, not something to guess at.

use tracing::{debug, warn};

use crate::frame_clock::Tick;

/// Canonical subject state IDs observed at the transition interception
/// point. Domain constants, confirmed against the live host.
pub mod state {
    /// Reset/reload transition state. Any edge out of it means a
    /// play-or-reload session just started.
    pub const RESET: u32 = 16;
    /// Ground locomotion, play mode only.
    pub const WALK: u32 = 1;
    /// Death sequence entry.
    pub const DEATH: u32 = 9;
    /// Death sequence terminal.
    pub const DEATH_EXIT: u32 = 10;
    /// Idle/suspended state, shared by edit mode and underwater play.
    pub const IDLE: u32 = 43;
    /// Goal sequence entry.
    pub const GOAL: u32 = 122;
    /// Goal sequence terminal.
    pub const GOAL_EXIT: u32 = 124;
}

/// The classified high-level activity of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Initial state and safe fallback.
    #[default]
    Unknown,
    /// Editor, subject not actively simulated.
    Editing,
    /// Active play (including in-editor test play).
    Playing,
    /// Goal sequence running.
    GoalSequence,
    /// Death sequence running.
    DeathSequence,
}

impl Mode {
    /// Wire code used in the status block.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Mode::Unknown => 0,
            Mode::Editing => 1,
            Mode::Playing => 2,
            Mode::GoalSequence => 3,
            Mode::DeathSequence => 4,
        }
    }

    /// Inverse of [`code`](Self::code), for consumers decoding a block.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Mode::Unknown),
            1 => Some(Mode::Editing),
            2 => Some(Mode::Playing),
            3 => Some(Mode::GoalSequence),
            4 => Some(Mode::DeathSequence),
            _ => None,
        }
    }
}

/// A discrete-state change observed at an interception point.
///
/// Ephemeral: consumed by [`SceneClassifier::apply`] and not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Tick at which the transition was observed.
    pub tick: Tick,
    /// State the subject left.
    pub old_state: u32,
    /// State the subject entered.
    pub new_state: u32,
}

/// A mode boundary crossed by a transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

/// Transition-event state machine deriving [`Mode`].
///
/// Runs for the process lifetime; there is no terminal state. Replaying the
/// same ordered event sequence from a fresh classifier always yields the
/// same final mode.
#[derive(Debug, Default)]
pub struct SceneClassifier {
    mode: Mode,
    last_phase: Option<i32>,
    ambiguous: u64,
}

impl SceneClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of events where more than one edge rule matched.
    #[must_use]
    pub const fn ambiguous_events(&self) -> u64 {
        self.ambiguous
    }

    /// Most recently observed coarse phase, if any.
    #[must_use]
    pub const fn last_phase(&self) -> Option<i32> {
        self.last_phase
    }

    /// Record a coarse phase read. Diagnostic only: phase cannot tell edit
    /// mode from test play, so it never forces a mode change.
    pub fn observe_phase(&mut self, phase: i32) {
        self.last_phase = Some(phase);
    }

    /// Apply one transition event. Returns the mode change it caused, if
    /// any, so the caller can react to boundaries (the tracked subject
    /// reference is destroyed on the edge into `Editing`, for instance).
    pub fn apply(&mut self, event: TransitionEvent) -> Option<ModeChange> {
        let TransitionEvent {
            tick,
            old_state,
            new_state,
        } = event;

        // Edge rules, most specific first. Entering the death or goal state
        // is unambiguous play evidence; the terminal-to-idle edges mark the
        // return to the editor; any edge out of RESET marks a (re)started
        // play session.
        let death = (new_state == state::DEATH).then_some(Mode::DeathSequence);
        let goal = (new_state == state::GOAL).then_some(Mode::GoalSequence);
        let editing = (matches!(old_state, state::GOAL_EXIT | state::DEATH_EXIT)
            && new_state == state::IDLE)
            .then_some(Mode::Editing);
        let playing = (old_state == state::RESET).then_some(Mode::Playing);

        let mut matched = [death, goal, editing, playing].into_iter().flatten();
        let target = matched.next()?;
        if matched.next().is_some() {
            self.ambiguous += 1;
            warn!(
                tick,
                old_state,
                new_state,
                resolved = ?target,
                "ambiguous transition; specific rule takes precedence"
            );
        }

        if target == self.mode {
            return None;
        }
        let change = ModeChange {
            from: self.mode,
            to: target,
        };
        self.mode = target;
        debug!(tick, from = ?change.from, to = ?change.to, "mode change");
        Some(change)
    }
}
