//! Coedit client library
//!
//! Client side of a collaborative page editor: debounced autosave to the page
//! server, whole-document conflict resolution, and live updates pushed over a
//! websocket.
//!
//! The sync policy lives in [`SyncCoordinator`], which performs no IO. The
//! [`actor`] module runs it in a tokio task behind a `Send+Sync`
//! [`EditorHandle`]; [`open_editor`] bootstraps a document and spawns that task.

pub mod actor;
pub mod channel;
pub mod client;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod resolver;
pub mod session;
pub mod tracker;
pub mod ui;

pub use actor::{ActorError, EditorHandle, EditorServices, EditorSnapshot, spawn_editor};
pub use channel::{ChannelEvent, ChannelState, LiveChannel, push_url};
pub use client::{http_api, open_editor, open_editor_at};
pub use config::ClientConfig;
pub use coordinator::{Effect, EditorEvent, ReplaceOrigin, SyncCoordinator};
pub use document::{ChildListing, ChildPage, DocumentRef};
pub use error::{ClientError, ConfigError};
pub use identity::{
    ActorToken, FileTokenStore, IdentityError, IdentityProvider, MemoryTokenStore, TokenStore,
};
pub use persistence::{HttpPageApi, PageApi, SaveOutcome, SaveRequest};
pub use resolver::{ConflictCandidate, ConflictChoice, ConflictResolver, Resolution};
pub use session::EditSession;
pub use tracker::DebouncedEditTracker;
pub use ui::{ChildPageView, Notice, NoticeLevel, NotifySink, UserPrompt};
