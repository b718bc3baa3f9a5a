//! Debounced autosave scheduling.
//!
//! Every edit pushes the single deadline out to `now + quiet`; the save only
//! fires once the user has stopped typing for a full quiet period. The
//! deadline lives on the [`EditSession`] and is polled by whoever owns the
//! event loop.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::constants::{DEFAULT_DEBOUNCE, MAX_DEBOUNCE};
use crate::session::EditSession;

#[derive(Debug, Clone, Copy)]
pub struct DebouncedEditTracker {
    quiet: Duration,
}

impl Default for DebouncedEditTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl DebouncedEditTracker {
    /// Quiet periods longer than [`MAX_DEBOUNCE`] are clamped to it.
    pub fn new(quiet: Duration) -> Self {
        Self { quiet: quiet.min(MAX_DEBOUNCE) }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record a buffer mutation: mark dirty, cancel the previous deadline and
    /// arm a new one. Returns the new deadline.
    pub fn on_edit(&self, session: &mut EditSession, now: Instant) -> Instant {
        let deadline = now.checked_add(self.quiet).unwrap_or(now);
        if session.pending_deadline().is_some() {
            trace!("re-arming autosave deadline");
        }
        session.arm(deadline);
        deadline
    }

    /// Whether the armed deadline has passed.
    pub fn is_due(&self, session: &EditSession, now: Instant) -> bool {
        session.pending_deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Fire the deadline if it is due: clear `dirty` and the deadline, and
    /// return the buffer snapshot to save.
    ///
    /// `dirty` is cleared before the save goes out, so a push arriving during
    /// the round trip is treated as "not typing".
    pub fn fire(&self, session: &mut EditSession, now: Instant) -> Option<String> {
        if !self.is_due(session, now) {
            return None;
        }
        session.disarm();
        Some(session.buffer().to_string())
    }
}
