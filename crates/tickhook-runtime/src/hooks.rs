#![forbid(unsafe_code)]

//! The hook installation capability.
//!
//! tickhook does not own a trampoline mechanism. The embedder injects one:
//! anything that can, given a stable symbolic identifier, route calls to
//! that entry point through a handler while preserving the ability to run
//! the original behavior. This module defines the capability as a trait
//! plus the three typed interception points the pipeline needs; pre/post
//! position and call-original are the installer's obligation, documented
//! per hook point.
//!
//! [`SimulatedHost`](crate::simulator::SimulatedHost) implements the trait
//! for tests; a production embedder wraps its trampoline library.

use std::fmt;

use thiserror::Error;
use tickhook_core::{EntityRef, InputFrame};

/// Stable symbolic identifiers for the host entry points tickhook
/// intercepts.
pub mod symbols {
    /// The host's per-frame simulation step. Hooked post: the original
    /// runs, then the observer.
    pub const SIM_STEP: &str = "procFrame_";
    /// The subject's state-change entry. Hooked wrapping: the old state is
    /// read before the original runs, the observer sees both.
    pub const SUBJECT_CHANGE_STATE: &str = "SubjectObject_changeState";
    /// The host's controller poll. Hooked post: the original fills the
    /// real input, the filter decides what the host actually sees.
    pub const INPUT_READ: &str = "GetPadStates";
}

/// A state transition observed at [`symbols::SUBJECT_CHANGE_STATE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Base reference of the subject the call was made on. Fresh by
    /// construction: the host just used it.
    pub entity: EntityRef,
    pub old_state: u32,
    pub new_state: u32,
}

/// A typed handler for one interception point.
pub enum Hook {
    /// Post-hook on the per-frame simulation step.
    SimStep(Box<dyn FnMut()>),
    /// Wrapping hook on the subject's state change.
    StateChange(Box<dyn FnMut(StateChange)>),
    /// Post-hook on the controller poll; the returned frame replaces what
    /// the host read.
    InputRead(Box<dyn FnMut(InputFrame) -> InputFrame>),
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Hook::SimStep(_) => "SimStep",
            Hook::StateChange(_) => "StateChange",
            Hook::InputRead(_) => "InputRead",
        };
        f.debug_tuple("Hook").field(&kind).finish()
    }
}

/// Install-by-name capability, provided by the embedder.
pub trait HookInstaller {
    /// Route calls to `symbol` through `hook`. The installer must preserve
    /// original behavior (call-original) in the position the [`Hook`]
    /// variant documents.
    fn install(&mut self, symbol: &str, hook: Hook) -> Result<(), HookError>;
}

/// Hook installation failures. These are startup-time errors; once
/// installed, hooks are never torn down and never disabled.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("hook already installed at {0}")]
    AlreadyInstalled(String),
    #[error("wrong hook kind for {symbol}: expected {expected}")]
    KindMismatch {
        symbol: String,
        expected: &'static str,
    },
}
