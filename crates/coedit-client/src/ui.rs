//! Front-end collaborators.
//!
//! The sync core never renders anything itself. It hands notices, child-page
//! listings and questions to these traits; a terminal, a GUI or a test fake
//! decides what they look like.

use async_trait::async_trait;

use crate::document::{ChildListing, DocumentRef};
use crate::resolver::{ConflictCandidate, ConflictChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A transient notification ("toast").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { message: message.into(), level: NoticeLevel::Success }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { message: message.into(), level: NoticeLevel::Info }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { message: message.into(), level: NoticeLevel::Error }
    }
}

pub trait NotifySink: Send + Sync {
    fn show(&self, notice: &Notice);
}

/// Sidebar of child pages.
pub trait ChildPageView: Send + Sync {
    fn refresh(&self, document: &DocumentRef, listing: &ChildListing);
}

/// Questions that need the user. Each call may take as long as the user
/// likes; the editor keeps processing events meanwhile.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Someone else saved first. Keep ours or take theirs?
    async fn resolve_conflict(&self, candidate: ConflictCandidate) -> ConflictChoice;

    /// Another user saved while we're typing. Apply their `content` now?
    async fn confirm_incoming(&self, content: String) -> bool;
}
