//! In-memory editing state for one open document.

use tokio::time::Instant;

/// The local buffer plus the autosave bookkeeping around it.
///
/// Invariant: `dirty` is true exactly while a debounce deadline is armed,
/// except for the instant between deadline expiry and the save being issued.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    buffer: String,
    dirty: bool,
    pending_deadline: Option<Instant>,
}

impl EditSession {
    pub fn new(initial: impl Into<String>) -> Self {
        Self { buffer: initial.into(), dirty: false, pending_deadline: None }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending_deadline
    }

    /// Replace the buffer with user-typed content.
    pub(crate) fn set_buffer(&mut self, content: String) {
        self.buffer = content;
    }

    /// Mark dirty and arm (or re-arm) the single debounce deadline.
    pub(crate) fn arm(&mut self, deadline: Instant) {
        self.dirty = true;
        self.pending_deadline = Some(deadline);
    }

    /// Disarm the deadline and clear `dirty`.
    pub(crate) fn disarm(&mut self) {
        self.dirty = false;
        self.pending_deadline = None;
    }

    /// Replace the buffer with content that came from the server and drop any
    /// pending autosave: the buffer no longer holds unsaved local edits.
    pub(crate) fn replace_from_server(&mut self, content: String) {
        self.buffer = content;
        self.disarm();
    }

    /// Back to a clean session holding `content`.
    pub fn reset(&mut self, content: impl Into<String>) {
        *self = Self::new(content);
    }
}
