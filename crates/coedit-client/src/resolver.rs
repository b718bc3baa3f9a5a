//! Whole-document conflict resolution.
//!
//! ```text
//!            Conflict outcome
//!   Idle ─────────────────────▶ PromptOpen(candidate)
//!    ▲                              │
//!    │   KeepMine → forced save     │
//!    └──────────────────────────────┘
//!        DiscardMine → pull server
//! ```
//!
//! A conflict that arrives while a prompt is open is dropped: there is only
//! one document per editor, so the open prompt already covers it.

use tracing::{info, warn};

/// The two versions shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCandidate {
    /// What we tried to save, captured when the prompt opened.
    pub local_content: String,
    /// What the server holds.
    pub server_content: String,
}

/// The user's answer to a conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Overwrite the server with our content.
    KeepMine,
    /// Throw our content away and load the server's.
    DiscardMine,
}

/// What to do after the user answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Save `content` with `force_overwrite = true`.
    ForceSave { content: String },
    /// Fetch server content and replace the buffer. No save.
    PullServer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ResolverState {
    #[default]
    Idle,
    PromptOpen(ConflictCandidate),
}

#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    state: ResolverState,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ResolverState::PromptOpen(_))
    }

    pub fn candidate(&self) -> Option<&ConflictCandidate> {
        match &self.state {
            ResolverState::PromptOpen(candidate) => Some(candidate),
            ResolverState::Idle => None,
        }
    }

    /// Open the prompt. Returns `false` (and drops `candidate`) if one is
    /// already open.
    pub fn open(&mut self, candidate: ConflictCandidate) -> bool {
        if self.is_open() {
            warn!("conflict prompt already open, dropping new conflict");
            return false;
        }
        info!(
            local_len = candidate.local_content.len(),
            server_len = candidate.server_content.len(),
            "opening conflict prompt"
        );
        self.state = ResolverState::PromptOpen(candidate);
        true
    }

    /// Close the prompt with the user's choice. `None` if no prompt was open.
    pub fn resolve(&mut self, choice: ConflictChoice) -> Option<Resolution> {
        let ResolverState::PromptOpen(candidate) = std::mem::take(&mut self.state) else {
            warn!(?choice, "conflict choice with no open prompt, ignoring");
            return None;
        };
        info!(?choice, "conflict resolved");
        Some(match choice {
            ConflictChoice::KeepMine => Resolution::ForceSave { content: candidate.local_content },
            ConflictChoice::DiscardMine => Resolution::PullServer,
        })
    }
}
