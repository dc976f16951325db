#![forbid(unsafe_code)]

//! Tracking a weak, possibly-stale reference to the observed subject.
//!
//! Interception points hand us a raw base reference to the subject whenever
//! the host calls through them. The reference is never owned: the host can
//! destroy and reallocate the subject at any time without telling us. The
//! tracker therefore models the reference as a triple of (reference,
//! last-confirmed tick, independently verified liveness), and nothing in
//! this crate dereferences a subject address without passing the validity
//! predicate first.
//!
//! Recency alone is not enough. The host reuses the same discrete state
//! values in legitimate and about-to-be-destroyed contexts, so a reference
//! can look fresh while pointing at a corpse. The coarse phase read catches
//! what recency misses: a phase outside the subject-exists set forces the
//! handle invalid regardless of how recently it was confirmed.

use tracing::trace;

use crate::frame_clock::Tick;

/// Opaque base reference to the observed subject inside the host process.
///
/// Never dereferenced by this crate; the runtime turns it into typed field
/// reads only after [`EntityTracker::current`] vouches for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef(pub u64);

/// Default grace window: two seconds at the host's 60 Hz step rate.
pub const DEFAULT_STALE_WINDOW: u64 = 120;

/// Weak subject handle with staleness detection.
#[derive(Debug)]
pub struct EntityTracker {
    current: Option<EntityRef>,
    last_confirmed: Tick,
    stale_window: u64,
}

impl EntityTracker {
    /// Create a tracker with the given staleness window, in ticks.
    ///
    /// A handle is valid while `tick - last_confirmed <= stale_window`; it
    /// never outlives the confirming tick plus this grace window.
    #[must_use]
    pub fn new(stale_window: u64) -> Self {
        Self {
            current: None,
            last_confirmed: 0,
            stale_window,
        }
    }

    /// Record a fresh reference supplied by an interception point.
    ///
    /// Always replaces the previous reference: the address can change
    /// between play sessions even when the old one still looks alive.
    pub fn on_seen(&mut self, entity: EntityRef, tick: Tick) {
        self.current = Some(entity);
        self.last_confirmed = tick;
    }

    /// The current reference, if it passes the validity predicate.
    ///
    /// Valid iff a reference exists, `phase_live` is true (the caller's
    /// independent phase read is in the subject-exists set), and the
    /// reference was confirmed within the staleness window. A reference
    /// that crosses the window boundary is cleared here, silently: going
    /// stale is expected behavior, not an error.
    pub fn current(&mut self, tick: Tick, phase_live: bool) -> Option<EntityRef> {
        let entity = self.current?;
        if tick.saturating_sub(self.last_confirmed) > self.stale_window {
            trace!(tick, last_confirmed = self.last_confirmed, "subject reference went stale");
            self.current = None;
            return None;
        }
        if !phase_live {
            return None;
        }
        Some(entity)
    }

    /// Ticks since the reference was last confirmed.
    #[must_use]
    pub fn age(&self, tick: Tick) -> u64 {
        tick.saturating_sub(self.last_confirmed)
    }

    /// Explicitly drop the reference.
    ///
    /// Used on the edge into editing mode: the subject is destroyed when a
    /// play session ends, whatever its last-confirmed tick says.
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: EntityRef = EntityRef(0x7100_0000);

    #[test]
    fn empty_tracker_has_no_subject() {
        let mut t = EntityTracker::new(10);
        assert_eq!(t.current(5, true), None);
    }

    #[test]
    fn valid_within_window_invalid_exactly_past_it() {
        let mut t = EntityTracker::new(10);
        t.on_seen(SUBJECT, 100);
        assert_eq!(t.current(100, true), Some(SUBJECT));
        assert_eq!(t.current(110, true), Some(SUBJECT));
        // One past the boundary: invalid, deterministically, exactly once.
        assert_eq!(t.current(111, true), None);
        // And the reference is gone for good, even if time rewinds.
        assert_eq!(t.current(100, true), None);
    }

    #[test]
    fn phase_gate_forces_invalid_regardless_of_recency() {
        let mut t = EntityTracker::new(10);
        t.on_seen(SUBJECT, 100);
        assert_eq!(t.current(100, false), None);
        // The reference itself survives a phase dip; only staleness clears it.
        assert_eq!(t.current(101, true), Some(SUBJECT));
    }

    #[test]
    fn reseen_reference_resets_the_window() {
        let mut t = EntityTracker::new(10);
        t.on_seen(SUBJECT, 100);
        t.on_seen(EntityRef(0x7200_0000), 109);
        assert_eq!(t.current(115, true), Some(EntityRef(0x7200_0000)));
        assert_eq!(t.age(115), 6);
    }

    #[test]
    fn invalidate_clears_immediately() {
        let mut t = EntityTracker::new(10);
        t.on_seen(SUBJECT, 100);
        t.invalidate();
        assert_eq!(t.current(100, true), None);
    }
}
