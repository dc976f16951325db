#![forbid(unsafe_code)]

//! The session: one explicitly-owned context wiring the whole pipeline.
//!
//! A [`Session`] owns every piece of process-wide mutable state (clock,
//! classifier, tracker, injector, publisher, log streams) and is driven
//! through three entry points matching the three interception points:
//!
//! - [`on_state_change`](Session::on_state_change) - the subject changed
//!   discrete state. Logs the transition row, refreshes the tracked
//!   reference, queues the event for classification.
//! - [`on_input_read`](Session::on_input_read) - the host polled its
//!   controller; returns the merged input the host will see.
//! - [`on_tick`](Session::on_tick) - the per-frame step. Runs the stages
//!   in a fixed order so the ordering guarantee holds: every transition
//!   observed up to and including tick N is applied to the classifier
//!   before the snapshot for tick N is published.
//!
//! [`Session::attach`] installs those entry points through the injected
//! hook capability, wrapping the session in `Rc<RefCell<_>>`. That is
//! sound only under the host contract this whole system assumes: a single
//! simulation thread, no reentrancy. Verify that against the actual host
//! before reuse.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::rc::Rc;

use tracing::{debug, info};

use tickhook_core::{
    EntityRef, EntityTracker, FrameClock, InputFrame, InputInjector, KeyframeScript, Mode,
    RingLogger, SceneClassifier, StatusPublisher, StatusSnapshot, Tick, TransitionEvent,
    ring_log::LogSink,
    status::StatusSink,
};

use crate::channels::{LiveInputFile, LogStream, StatusFile};
use crate::config::Config;
use crate::hooks::{Hook, HookError, HookInstaller, StateChange, symbols};
use crate::memory::{MemorySource, PhaseReader, SubjectView, phase, subject};

/// Column headers, written once when a stream is created.
const STATES_HEADER: &str = "tick,old_state,new_state,entity,pos_x,pos_y,vel_x,vel_y\n";
const PHASES_HEADER: &str = "tick,old_phase,new_phase\n";
const FIELDS_HEADER: &str = "tick,state,state_age,variant,pos_x,pos_y,vel_x,vel_y,in_water\n";

/// The sinks a session publishes through. [`Session::open`] builds the
/// file-backed set; tests supply in-memory ones.
pub struct SessionSinks {
    pub status: Box<dyn StatusSink>,
    pub states: Box<dyn LogSink>,
    pub phases: Box<dyn LogSink>,
    pub fields: Box<dyn LogSink>,
}

/// A session shared with installed hooks.
pub type SharedSession = Rc<RefCell<Session>>;

/// Process-wide pipeline state, singly owned, singly threaded.
pub struct Session {
    cfg: Config,
    clock: FrameClock,
    classifier: SceneClassifier,
    tracker: EntityTracker,
    injector: InputInjector,
    publisher: StatusPublisher<Box<dyn StatusSink>>,
    states: RingLogger<Box<dyn LogSink>>,
    phases: RingLogger<Box<dyn LogSink>>,
    fields: RingLogger<Box<dyn LogSink>>,
    mem: Box<dyn MemorySource>,
    phase_reader: PhaseReader,
    live_input: Option<LiveInputFile>,
    pending: Vec<TransitionEvent>,
    last_phase: Option<i32>,
}

impl Session {
    /// Assemble a session from explicit parts. Headers are written to the
    /// log streams here, so sinks should be fresh.
    #[must_use]
    pub fn new(
        cfg: Config,
        mem: Box<dyn MemorySource>,
        sinks: SessionSinks,
        injector: InputInjector,
    ) -> Self {
        let mut states = RingLogger::with_default_capacity(sinks.states);
        let mut phases = RingLogger::with_default_capacity(sinks.phases);
        let mut fields = RingLogger::with_default_capacity(sinks.fields);
        states.append(STATES_HEADER.as_bytes());
        phases.append(PHASES_HEADER.as_bytes());
        fields.append(FIELDS_HEADER.as_bytes());

        let phase_reader = PhaseReader::new(cfg.phase_global);
        Self {
            tracker: EntityTracker::new(cfg.stale_window),
            clock: FrameClock::new(),
            classifier: SceneClassifier::new(),
            injector,
            publisher: StatusPublisher::new(sinks.status),
            states,
            phases,
            fields,
            mem,
            phase_reader,
            live_input: None,
            pending: Vec::new(),
            last_phase: None,
            cfg,
        }
    }

    /// Open a file-backed session under `cfg.data_dir`.
    ///
    /// Injection mode is decided here, once: a readable script resource
    /// selects script mode, otherwise the session polls the live input
    /// channel. That choice holds for the process lifetime.
    pub fn open(cfg: Config, mem: Box<dyn MemorySource>) -> io::Result<Self> {
        fs::create_dir_all(&cfg.data_dir)?;

        let injector = match fs::read_to_string(cfg.script_path()) {
            Ok(text) => {
                let script = KeyframeScript::parse(&text);
                info!(
                    keyframes = script.len(),
                    skipped = script.skipped_rows(),
                    "script resource found; script mode"
                );
                InputInjector::from_script(script)
            }
            Err(_) => {
                info!("no script resource; live mode");
                InputInjector::live(cfg.live_poll_interval)
            }
        };
        let live_input = injector
            .is_live()
            .then(|| LiveInputFile::new(cfg.live_input_path()));

        let sinks = SessionSinks {
            status: Box::new(StatusFile::create(&cfg.status_path())?),
            states: Box::new(LogStream::create(&cfg.data_dir.join("states.csv"))?),
            phases: Box::new(LogStream::create(&cfg.data_dir.join("phases.csv"))?),
            fields: Box::new(LogStream::create(&cfg.data_dir.join("fields.csv"))?),
        };

        let mut session = Self::new(cfg, mem, sinks, injector);
        session.live_input = live_input;
        Ok(session)
    }

    /// Install the three interception points through `installer` and hand
    /// back the shared session the hooks drive.
    pub fn attach(self, installer: &mut dyn HookInstaller) -> Result<SharedSession, HookError> {
        let shared = Rc::new(RefCell::new(self));

        let session = Rc::clone(&shared);
        installer.install(
            symbols::SIM_STEP,
            Hook::SimStep(Box::new(move || {
                session.borrow_mut().on_tick();
            })),
        )?;

        let session = Rc::clone(&shared);
        installer.install(
            symbols::SUBJECT_CHANGE_STATE,
            Hook::StateChange(Box::new(move |change| {
                session.borrow_mut().on_state_change(change);
            })),
        )?;

        let session = Rc::clone(&shared);
        installer.install(
            symbols::INPUT_READ,
            Hook::InputRead(Box::new(move |real| {
                session.borrow_mut().on_input_read(real)
            })),
        )?;

        Ok(shared)
    }

    /// The subject changed discrete state.
    ///
    /// Runs at transition time, inside the host's call: log the raw row
    /// with a physics snapshot, refresh the tracked reference (the host
    /// just proved it fresh), and queue the event. Classification itself
    /// waits for `on_tick` so a tick's events land atomically before its
    /// snapshot.
    pub fn on_state_change(&mut self, change: StateChange) {
        let tick = self.clock.current();
        let base = change.entity.0;
        let pos_x = subject::POS_X.read_f32(&self.mem, base).unwrap_or(0.0);
        let pos_y = subject::POS_Y.read_f32(&self.mem, base).unwrap_or(0.0);
        let vel_x = subject::VEL_X.read_f32(&self.mem, base).unwrap_or(0.0);
        let vel_y = subject::VEL_Y.read_f32(&self.mem, base).unwrap_or(0.0);
        self.states.append_fmt(format_args!(
            "{},{},{},{:#x},{:.2},{:.2},{:.4},{:.4}\n",
            tick, change.old_state, change.new_state, base, pos_x, pos_y, vel_x, vel_y
        ));

        self.tracker.on_seen(change.entity, tick);
        self.pending.push(TransitionEvent {
            tick,
            old_state: change.old_state,
            new_state: change.new_state,
        });
    }

    /// The host polled its controller; merge the synthetic input over it.
    ///
    /// The poll happens inside the frame the host is about to finish, so
    /// the script cursor is advanced to that upcoming tick before merging.
    /// The advance in `on_tick` is then a no-op for the same tick.
    #[must_use]
    pub fn on_input_read(&mut self, real: InputFrame) -> InputFrame {
        self.injector.advance(self.clock.current() + 1);
        self.injector.merge(real)
    }

    /// One simulation step. Returns the new tick.
    pub fn on_tick(&mut self) -> Tick {
        let tick = self.clock.on_tick();

        // 1. Classification: everything observed since the last tick.
        for event in self.pending.drain(..) {
            if let Some(change) = self.classifier.apply(event) {
                if change.to == Mode::Editing {
                    // The subject is destroyed when a play session ends.
                    self.tracker.invalidate();
                    debug!(tick, "entered editing; subject reference invalidated");
                }
            }
        }

        // 2. Phase read. A failed walk keeps the previous value (transient,
        // retried next tick); a changed value is logged and recorded.
        if let Some(current) = self.phase_reader.read(&self.mem) {
            if self.last_phase != Some(current) {
                let old = self.last_phase.unwrap_or(-1);
                self.phases
                    .append_fmt(format_args!("{tick},{old},{current}\n"));
                self.classifier.observe_phase(current);
                self.last_phase = Some(current);
            }
        }
        let phase_live = self.last_phase.is_some_and(phase::subject_exists);

        // 3. Synthetic input for this tick.
        self.injector.advance(tick);
        if self.injector.needs_poll(tick) {
            if let Some(sample) = self.live_input.as_ref().and_then(LiveInputFile::poll) {
                self.injector.supply_sample(sample);
            }
        }

        // 4. Snapshot, after all of this tick's events.
        let snapshot = self.assemble_snapshot(tick, phase_live);
        self.publisher.publish(&snapshot);

        // 5. Field trace.
        if self.cfg.field_trace && tick % self.cfg.field_trace_interval == 0 {
            self.trace_fields(tick, phase_live);
        }

        // 6. Cadenced flush.
        if tick % self.cfg.flush_interval == 0 {
            self.flush();
        }

        tick
    }

    fn assemble_snapshot(&mut self, tick: Tick, phase_live: bool) -> StatusSnapshot {
        let raw_phase = self.last_phase.unwrap_or(-1);
        let mode = self.classifier.mode();
        let Some(entity) = self.tracker.current(tick, phase_live) else {
            return StatusSnapshot::without_entity(tick, mode, raw_phase);
        };
        // A failed read this tick publishes as invalid rather than exposing
        // a partial or stale mix.
        let Some(view) = SubjectView::sample(&self.mem, entity) else {
            return StatusSnapshot::without_entity(tick, mode, raw_phase);
        };
        StatusSnapshot {
            tick,
            mode,
            entity_valid: true,
            raw_phase,
            discrete_state: view.state,
            state_age_ticks: view.state_age,
            variant_id: view.variant_id,
            raw_flags: u32::from(view.in_water),
            pos_x: view.pos_x,
            pos_y: view.pos_y,
            vel_x: view.vel_x,
            vel_y: view.vel_y,
        }
    }

    fn trace_fields(&mut self, tick: Tick, phase_live: bool) {
        let Some(entity) = self.tracker.current(tick, phase_live) else {
            return;
        };
        let Some(view) = SubjectView::sample(&self.mem, entity) else {
            return;
        };
        self.fields.append_fmt(format_args!(
            "{},{},{},{},{:.2},{:.2},{:.4},{:.4},{}\n",
            tick,
            view.state,
            view.state_age,
            view.variant_id,
            view.pos_x,
            view.pos_y,
            view.vel_x,
            view.vel_y,
            u8::from(view.in_water)
        ));
    }

    /// Flush every log stream. Called on the cadence and at shutdown.
    pub fn flush(&mut self) {
        self.states.flush();
        self.phases.flush();
        self.fields.flush();
    }

    // ── Introspection, mostly for tests and embedder diagnostics ────────

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.clock.current()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.classifier.mode()
    }

    #[must_use]
    pub fn classifier(&self) -> &SceneClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn injector(&self) -> &InputInjector {
        &self.injector
    }

    #[must_use]
    pub fn publisher(&self) -> &StatusPublisher<Box<dyn StatusSink>> {
        &self.publisher
    }

    /// The tracked subject, if currently valid.
    #[must_use]
    pub fn subject(&mut self) -> Option<EntityRef> {
        let tick = self.clock.current();
        let phase_live = self.last_phase.is_some_and(phase::subject_exists);
        self.tracker.current(tick, phase_live)
    }

    /// Register an auxiliary per-tick observer (research hooks and the
    /// like). Dispatched by the frame clock at the top of every tick.
    pub fn register_observer(&mut self, name: &'static str, f: impl FnMut(Tick) + 'static) {
        self.clock.register(name, f);
    }
}
