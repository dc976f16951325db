//! End-to-end pipeline tests against the simulated host.
//!
//! Hooks are installed for real via `Session::attach`; the simulator then
//! drives them exactly as the live host would, one frame at a time.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use tickhook_core::classifier::state;
use tickhook_core::status::{STATUS_BLOCK_LEN, StatusSink};
use tickhook_core::{
    Buttons, ChannelError, InputFrame, InputInjector, KeyframeScript, LogSink, Mode,
    StatusSnapshot,
};
use tickhook_runtime::memory::phase;
use tickhook_runtime::{Config, Session, SessionSinks, SharedSession, SimulatedHost};

// ── Shared in-memory sinks ──────────────────────────────────────────────

#[derive(Clone, Default)]
struct SharedLog(Rc<RefCell<Vec<u8>>>);

impl SharedLog {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl LogSink for SharedLog {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ChannelError> {
        let mut buf = self.0.borrow_mut();
        let offset = offset as usize;
        if buf.len() < offset + data.len() {
            buf.resize(offset + data.len(), 0);
        }
        buf[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedStatus(Rc<RefCell<Vec<[u8; STATUS_BLOCK_LEN]>>>);

impl SharedStatus {
    fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.0
            .borrow()
            .iter()
            .filter_map(|block| StatusSnapshot::decode(block))
            .collect()
    }
}

impl StatusSink for SharedStatus {
    fn publish(&mut self, block: &[u8; STATUS_BLOCK_LEN]) -> Result<(), ChannelError> {
        self.0.borrow_mut().push(*block);
        Ok(())
    }
}

struct Harness {
    host: SimulatedHost,
    session: SharedSession,
    status: SharedStatus,
    states: SharedLog,
    phases: SharedLog,
    fields: SharedLog,
}

fn harness(cfg: Config, injector: InputInjector) -> Harness {
    let mut host = SimulatedHost::new();
    let status = SharedStatus::default();
    let states = SharedLog::default();
    let phases = SharedLog::default();
    let fields = SharedLog::default();
    let sinks = SessionSinks {
        status: Box::new(status.clone()),
        states: Box::new(states.clone()),
        phases: Box::new(phases.clone()),
        fields: Box::new(fields.clone()),
    };
    let cfg = cfg.with_phase_global(host.phase_global());
    let session = Session::new(cfg, host.memory(), sinks, injector)
        .attach(&mut host)
        .expect("hook installation");
    Harness {
        host,
        session,
        status,
        states,
        phases,
        fields,
    }
}

fn live_harness(cfg: Config) -> Harness {
    harness(cfg.clone(), InputInjector::live(cfg.live_poll_interval))
}

// ── The §-scenario: play, goal, back to the editor ──────────────────────

#[test]
fn full_play_session_classifies_and_publishes() {
    let mut h = live_harness(Config::default());
    h.host.set_subject_pos(1220.25, 64.0);
    h.host.set_subject_vel(2.5, -1.25);

    // Editor idle until tick 49.
    h.host.run(49);
    assert_eq!(h.session.borrow().mode(), Mode::Unknown);

    // Reset edge at tick 50: reload into play.
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);
    h.host.step(InputFrame::NEUTRAL); // tick 50
    assert_eq!(h.session.borrow().mode(), Mode::Playing);

    // Cruise to the goal at tick 900.
    h.host.run(849);
    h.host.change_subject_state(state::GOAL);
    h.host.step(InputFrame::NEUTRAL); // tick 900
    assert_eq!(h.session.borrow().mode(), Mode::GoalSequence);

    // Goal terminal, then back to the editor idle state at tick 950.
    h.host.change_subject_state(state::GOAL_EXIT);
    h.host.run(49);
    h.host.change_subject_state(state::IDLE);
    h.host.step(InputFrame::NEUTRAL); // tick 950
    assert_eq!(h.session.borrow().mode(), Mode::Editing);

    let snapshots = h.status.snapshots();
    assert_eq!(snapshots.len(), 950);

    // Ticks strictly increase by exactly one per publish.
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.tick, i as u64 + 1);
    }

    let at = |tick: u64| snapshots[tick as usize - 1];
    assert_eq!(at(49).mode, Mode::Unknown);
    assert_eq!(at(50).mode, Mode::Playing);
    assert_eq!(at(899).mode, Mode::Playing);
    assert_eq!(at(900).mode, Mode::GoalSequence);
    assert_eq!(at(950).mode, Mode::Editing);

    // While playing the subject was valid with live physics fields.
    let playing = at(100);
    assert!(playing.entity_valid);
    assert_eq!(playing.pos_x, 1220.25);
    assert_eq!(playing.vel_y, -1.25);
    assert_eq!(playing.discrete_state, state::WALK);

    // Entering the editor destroyed the subject: valid=false, all zeroed.
    let editing = at(950);
    assert!(!editing.entity_valid);
    assert!(editing.entity_fields_zeroed());

    // The transition stream recorded the raw rows, in order.
    let states_csv = h.states.text();
    assert!(states_csv.starts_with("tick,old_state,new_state"));
    assert!(states_csv.contains("49,16,1"));
    assert!(states_csv.contains("899,1,122"));

    // Phase stream recorded the initial phase observation.
    assert!(h.phases.text().contains("1,-1,3"));
}

#[test]
fn death_sequence_classifies_and_returns_to_editor() {
    let mut h = live_harness(Config::default());
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);
    h.host.step(InputFrame::NEUTRAL);
    assert_eq!(h.session.borrow().mode(), Mode::Playing);

    h.host.change_subject_state(state::DEATH);
    h.host.step(InputFrame::NEUTRAL);
    assert_eq!(h.session.borrow().mode(), Mode::DeathSequence);

    h.host.change_subject_state(state::DEATH_EXIT);
    h.host.change_subject_state(state::IDLE);
    h.host.step(InputFrame::NEUTRAL);
    assert_eq!(h.session.borrow().mode(), Mode::Editing);
}

// ── Staleness and phase gating ──────────────────────────────────────────

#[test]
fn subject_goes_stale_at_the_window_boundary() {
    let mut h = live_harness(Config::default().with_stale_window(20));
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);

    // Confirmed at tick 0; valid through tick 20, invalid from 21 on.
    h.host.run(30);
    let snapshots = h.status.snapshots();
    assert!(snapshots[18].entity_valid, "within the window (tick 19)");
    assert!(snapshots[19].entity_valid, "at the boundary (tick 20)");
    assert!(!snapshots[20].entity_valid, "one past the boundary (tick 21)");
    assert!(snapshots[20].entity_fields_zeroed());
    // Exactly once: it never comes back without a fresh sighting.
    assert!(snapshots[21..].iter().all(|s| !s.entity_valid));
}

#[test]
fn phase_outside_subject_set_forces_invalid() {
    let mut h = live_harness(Config::default());
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);
    h.host.step(InputFrame::NEUTRAL);
    assert!(h.status.snapshots().last().unwrap().entity_valid);

    // Host drops to a frontend phase: recency no longer matters.
    h.host.set_phase(0);
    h.host.step(InputFrame::NEUTRAL);
    let snapshot = *h.status.snapshots().last().unwrap();
    assert!(!snapshot.entity_valid);
    assert!(snapshot.entity_fields_zeroed());
    assert_eq!(snapshot.raw_phase, 0);

    // Back to play phase within the window: valid again.
    h.host.set_phase(phase::PLAY);
    h.host.step(InputFrame::NEUTRAL);
    assert!(h.status.snapshots().last().unwrap().entity_valid);
}

#[test]
fn severed_phase_chain_retains_last_phase() {
    let mut h = live_harness(Config::default());
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);
    h.host.step(InputFrame::NEUTRAL);

    // Transient read failure: last phase (3) is retained, subject stays valid.
    h.host.unlink_phase_chain();
    h.host.run(5);
    let snapshot = *h.status.snapshots().last().unwrap();
    assert!(snapshot.entity_valid);
    assert_eq!(snapshot.raw_phase, 3);
}

#[test]
fn destroyed_subject_publishes_invalid_not_garbage() {
    let mut h = live_harness(Config::default());
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);
    h.host.step(InputFrame::NEUTRAL);
    assert!(h.status.snapshots().last().unwrap().entity_valid);

    // The struct vanishes but the reference still looks fresh: the failed
    // read must surface as invalid, not as stale leftovers.
    h.host.destroy_subject();
    h.host.step(InputFrame::NEUTRAL);
    let snapshot = *h.status.snapshots().last().unwrap();
    assert!(!snapshot.entity_valid);
    assert!(snapshot.entity_fields_zeroed());
}

// ── Input injection through the real hook ───────────────────────────────

#[test]
fn scripted_input_reaches_the_host_merged() {
    let script = KeyframeScript::parse("tick,buttons,axis_x,axis_y\n1,0x4000,0,0\n4,0x4001,0,0\n8,0,0,0\n");
    let mut h = harness(Config::default(), InputInjector::from_script(script));

    // Tick 1: script holds RIGHT; real A passes through OR-merged.
    let seen = h.host.step(InputFrame::new(Buttons::A, 500, 0));
    assert_eq!(seen.buttons.bits(), 0x4001);
    assert_eq!(seen.axis_x, 500, "zero synthetic axis defers to real");

    for _ in 0..2 {
        let seen = h.host.step(InputFrame::NEUTRAL);
        assert_eq!(seen.buttons.bits(), 0x4000);
    }
    // Tick 4 onward: RIGHT+A held.
    let seen = h.host.step(InputFrame::NEUTRAL);
    assert_eq!(seen.buttons.bits(), 0x4001);

    // Tick 8: zero keyframe exhausts the script; playback idles and real
    // input passes through untouched.
    h.host.run(3);
    let seen = h.host.step(InputFrame::new(Buttons::B, -7, 7));
    assert_eq!(seen.buttons, Buttons::B);
    assert_eq!(seen.axis_x, -7);
    assert!(!h.session.borrow().injector().is_active());
}

#[test]
fn trailing_hold_keeps_injecting() {
    let script = KeyframeScript::parse("tick,buttons,axis_x,axis_y\n1,0x01,0,0\n");
    let mut h = harness(Config::default(), InputInjector::from_script(script));
    h.host.run(100);
    let seen = h.host.step(InputFrame::NEUTRAL);
    assert_eq!(seen.buttons, Buttons::A);
    assert!(h.session.borrow().injector().is_active());
}

// ── Stream cadence ──────────────────────────────────────────────────────

#[test]
fn streams_flush_on_the_cadence() {
    let mut h = live_harness(Config::default().with_field_trace(true));
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::WALK);

    // Before the flush interval the data sits in the ring buffers.
    h.host.run(299);
    assert!(h.states.text().is_empty());
    assert!(h.fields.text().is_empty());

    // Tick 300: everything reaches the sinks.
    h.host.run(1);
    let states_csv = h.states.text();
    assert!(states_csv.starts_with("tick,old_state,new_state"));
    let fields_csv = h.fields.text();
    assert!(fields_csv.starts_with("tick,state,state_age"));
    // Field trace rows appear every 10 ticks while the subject is valid
    // (10 through 120 with the default stale window, then it went stale).
    assert!(fields_csv.contains("\n10,1,"));
    assert!(fields_csv.contains("\n120,1,"));
    assert!(!fields_csv.contains("\n130,1,"));
}

// ── Property: monotone, leak-free publishes under any host behavior ─────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn snapshots_stay_monotone_and_zeroed(actions in prop::collection::vec(0u8..6, 1..80)) {
        let mut h = live_harness(Config::default().with_stale_window(8));
        for action in actions {
            match action {
                0 => {
                    h.host.step(InputFrame::NEUTRAL);
                }
                1 => h.host.change_subject_state(state::RESET),
                2 => h.host.change_subject_state(state::WALK),
                3 => h.host.set_phase(0),
                4 => h.host.set_phase(phase::PLAY),
                _ => h.host.run(5),
            }
        }
        h.host.step(InputFrame::NEUTRAL);

        let snapshots = h.status.snapshots();
        prop_assert!(!snapshots.is_empty());
        for (i, snapshot) in snapshots.iter().enumerate() {
            // Strictly increasing by exactly one per publish.
            prop_assert_eq!(snapshot.tick, i as u64 + 1);
            // No stale leakage behind a cleared validity flag.
            if !snapshot.entity_valid {
                prop_assert!(snapshot.entity_fields_zeroed());
            }
        }
    }
}

#[test]
fn ambiguous_edge_resolves_to_the_specific_rule() {
    let mut h = live_harness(Config::default());
    // Straight from RESET into DEATH: both rules match, death wins.
    h.host.change_subject_state(state::RESET);
    h.host.change_subject_state(state::DEATH);
    h.host.step(InputFrame::NEUTRAL);
    let session = h.session.borrow();
    assert_eq!(session.mode(), Mode::DeathSequence);
    assert_eq!(session.classifier().ambiguous_events(), 1);
}
