#![forbid(unsafe_code)]

//! tickhook public facade and prelude.
//!
//! Attach to a live process through an injected hook capability, classify
//! its high-level mode from noisy transition events, publish a bit-exact
//! status snapshot every tick, and inject synthetic input, scripted or
//! live. See `tickhook-core` for the host-agnostic engine and
//! `tickhook-runtime` for the wiring.
//!
//! # Quick start
//!
//! ```no_run
//! use tickhook::prelude::*;
//!
//! # fn embed(installer: &mut dyn HookInstaller) -> Result<(), Box<dyn std::error::Error>> {
//! # struct LiveMemory; impl MemorySource for LiveMemory {
//! #     fn read(&self, _: u64, _: &mut [u8]) -> Result<(), tickhook::runtime::ReadError> { unimplemented!() }
//! # }
//! let cfg = Config::from_env().with_phase_global(0x2C5_7D58);
//! let session = Session::open(cfg, Box::new(LiveMemory))?;
//! let _session = session.attach(installer)?;
//! // The host drives everything from here: one on_tick per frame, forever.
//! # Ok(())
//! # }
//! ```

pub use tickhook_core as core;
#[cfg(feature = "runtime")]
pub use tickhook_runtime as runtime;

/// The commonly needed surface in one import.
pub mod prelude {
    pub use tickhook_core::{
        Buttons, EntityRef, EntityTracker, FrameClock, InputFrame, InputInjector, KeyframeScript,
        Mode, RingLogger, SceneClassifier, StatusPublisher, StatusSnapshot, Tick, TransitionEvent,
    };

    #[cfg(feature = "runtime")]
    pub use tickhook_runtime::{
        Config, Hook, HookError, HookInstaller, MemorySource, Session, SessionSinks, SimulatedHost,
    };
}
