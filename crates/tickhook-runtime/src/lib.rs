#![forbid(unsafe_code)]

//! Runtime: hook capability, raw struct reads, file channels, and the
//! per-tick session that wires the core pipeline to a live host.
//!
//! The split mirrors the one in `tickhook-core`'s docs: everything here
//! knows about the host (symbol names, struct offsets, file paths);
//! nothing in core does. The [`simulator`] module provides a deterministic
//! stand-in host so the full pipeline can be exercised without one.

pub mod channels;
pub mod config;
pub mod hooks;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod memory;
pub mod session;
pub mod simulator;

pub use channels::{LiveInputFile, LogStream, StatusFile};
pub use config::Config;
pub use hooks::{Hook, HookError, HookInstaller, StateChange, symbols};
pub use memory::{FieldDescriptor, MemorySource, PhaseReader, ReadError, phase, subject};
pub use session::{Session, SessionSinks, SharedSession};
pub use simulator::SimulatedHost;
