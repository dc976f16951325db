#![forbid(unsafe_code)]

//! Session configuration.
//!
//! Defaults match the deployed cadences: flush every 300 ticks (five
//! seconds at the host's 60 Hz step), field trace every 10, live input
//! poll every 2, staleness window 120. `TICKHOOK_*` environment variables
//! override the paths and toggles that vary per deployment.

use std::path::PathBuf;

use tickhook_core::entity::DEFAULT_STALE_WINDOW;

/// Everything the [`Session`](crate::session::Session) needs to know at
/// startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every channel file.
    pub data_dir: PathBuf,
    /// Ticks a subject reference stays valid without reconfirmation.
    pub stale_window: u64,
    /// Flush all log streams when `tick % flush_interval == 0`.
    pub flush_interval: u64,
    /// Emit a field-trace row when `tick % field_trace_interval == 0`.
    pub field_trace_interval: u64,
    /// Poll the live input channel when `tick % live_poll_interval == 0`.
    pub live_poll_interval: u64,
    /// Whether the per-field subject trace stream is written at all.
    pub field_trace: bool,
    /// Resolved address of the phase manager global (module base plus its
    /// fixed displacement). Zero means "not resolved": phase reads fail
    /// transiently and the subject is never considered phase-live.
    pub phase_global: u64,
    pub script_filename: String,
    pub status_filename: String,
    pub live_input_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("tickhook"),
            stale_window: DEFAULT_STALE_WINDOW,
            flush_interval: 300,
            field_trace_interval: 10,
            live_poll_interval: 2,
            field_trace: false,
            phase_global: 0,
            script_filename: "script.csv".into(),
            status_filename: "status.bin".into(),
            live_input_filename: "input.bin".into(),
        }
    }
}

impl Config {
    /// Defaults overridden by `TICKHOOK_DATA_DIR`, `TICKHOOK_STALE_WINDOW`,
    /// `TICKHOOK_FLUSH_INTERVAL`, and `TICKHOOK_FIELD_TRACE` (1/true).
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("TICKHOOK_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(window) = env_u64("TICKHOOK_STALE_WINDOW") {
            cfg.stale_window = window;
        }
        if let Some(interval) = env_u64("TICKHOOK_FLUSH_INTERVAL") {
            cfg.flush_interval = interval.max(1);
        }
        if let Ok(v) = std::env::var("TICKHOOK_FIELD_TRACE") {
            cfg.field_trace = v == "1" || v.eq_ignore_ascii_case("true");
        }
        cfg
    }

    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_stale_window(mut self, ticks: u64) -> Self {
        self.stale_window = ticks;
        self
    }

    #[must_use]
    pub fn with_phase_global(mut self, addr: u64) -> Self {
        self.phase_global = addr;
        self
    }

    #[must_use]
    pub fn with_field_trace(mut self, enabled: bool) -> Self {
        self.field_trace = enabled;
        self
    }

    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.data_dir.join(&self.script_filename)
    }

    #[must_use]
    pub fn status_path(&self) -> PathBuf {
        self.data_dir.join(&self.status_filename)
    }

    #[must_use]
    pub fn live_input_path(&self) -> PathBuf {
        self.data_dir.join(&self.live_input_filename)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}
