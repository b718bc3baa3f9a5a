//! The editor's sync state machine.
//!
//! [`SyncCoordinator`] ties the edit session, the autosave tracker, the
//! conflict resolver and the push channel state together. It performs no IO:
//! every input returns the [`Effect`]s the caller must carry out, and IO
//! results come back in as further inputs. This keeps the whole policy unit
//! testable with plain `#[test]`s and a hand-driven clock.
//!
//! # Inputs and effects
//!
//! ```text
//!   edit ──────────────▶ dirty, deadline re-armed
//!   tick (deadline) ───▶ Save(force=false)
//!   save_completed ────▶ Saved:    RefreshChildPages, Notify
//!                        Conflict: OpenConflictPrompt (unless one is open)
//!                        Failed:   logged only
//!   conflict_answered ─▶ KeepMine: Save(force=true, captured content)
//!                        Discard:  FetchServerContent
//!   channel_event ─────▶ clean buffer: replaced
//!                        dirty buffer: ConfirmIncoming
//!   incoming_answered ─▶ accepted: replaced, dirty cleared
//! ```
//!
//! While either prompt is open, or a save is in flight, the autosave deadline
//! is not serviced; edits still re-arm it and it fires afterwards.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelEvent, ChannelState};
use crate::constants::{SAVED_NOTICE, SERVER_CONTENT_NOTICE};
use crate::document::{ChildListing, ChildPage, DocumentRef};
use crate::error::ClientError;
use crate::identity::ActorToken;
use crate::persistence::{SaveOutcome, SaveRequest};
use crate::resolver::{ConflictCandidate, ConflictChoice, ConflictResolver, Resolution};
use crate::session::EditSession;
use crate::tracker::DebouncedEditTracker;
use crate::ui::Notice;

/// Where replacement buffer content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOrigin {
    /// Live update channel.
    Push,
    /// "Discard mine" pulled the server's version.
    ServerPull,
}

/// Observable editor events, broadcast to front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The buffer was overwritten by something other than the user.
    BufferReplaced { content: String, origin: ReplaceOrigin },
    ChannelStateChanged(ChannelState),
    Saved { forced: bool },
    SaveFailed { kind: &'static str, reason: String },
    ConflictOpened(ConflictCandidate),
    ConflictResolved(ConflictChoice),
    /// A push arrived mid-edit and the user chose to keep typing.
    IncomingDeclined,
}

/// Work the caller must perform on the coordinator's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send this save; report back through [`SyncCoordinator::save_completed`].
    Save(SaveRequest),
    /// Ask the user; report back through [`SyncCoordinator::conflict_answered`].
    OpenConflictPrompt(ConflictCandidate),
    /// Ask the user; report back through [`SyncCoordinator::incoming_answered`].
    ConfirmIncoming(String),
    /// Read server content; report back through
    /// [`SyncCoordinator::server_content_fetched`].
    FetchServerContent,
    /// Reload and re-render the child page list.
    RefreshChildPages,
    Notify(Notice),
    Emit(EditorEvent),
}

/// Sync policy for one open document.
#[derive(Debug)]
pub struct SyncCoordinator {
    document: DocumentRef,
    actor: ActorToken,
    session: EditSession,
    tracker: DebouncedEditTracker,
    resolver: ConflictResolver,
    channel: ChannelState,
    /// A save (debounced or forced) is waiting for its response.
    save_in_flight: bool,
    /// Latest push waiting on a mid-edit confirmation.
    pending_incoming: Option<String>,
    /// A confirmation prompt is open.
    confirm_open: bool,
}

impl SyncCoordinator {
    pub fn new(
        document: DocumentRef,
        actor: ActorToken,
        tracker: DebouncedEditTracker,
        initial_content: impl Into<String>,
    ) -> Self {
        Self {
            document,
            actor,
            session: EditSession::new(initial_content),
            tracker,
            resolver: ConflictResolver::new(),
            channel: ChannelState::Connecting,
            save_in_flight: false,
            pending_incoming: None,
            confirm_open: false,
        }
    }

    /// Build for a navigation path such as `/editor/notes/today/`.
    pub fn for_path(
        path: &str,
        prefix: &str,
        actor: ActorToken,
        tracker: DebouncedEditTracker,
        initial_content: impl Into<String>,
    ) -> Self {
        Self::new(DocumentRef::from_path(path, prefix), actor, tracker, initial_content)
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn actor(&self) -> &ActorToken {
        &self.actor
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel
    }

    pub fn conflict(&self) -> Option<&ConflictCandidate> {
        self.resolver.candidate()
    }

    pub fn is_save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// When the caller should next call [`tick`](Self::tick). `None` while
    /// autosave is suspended or nothing is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.autosave_suspended() {
            return None;
        }
        self.session.pending_deadline()
    }

    /// A user decision or a save is outstanding.
    fn autosave_suspended(&self) -> bool {
        self.resolver.is_open() || self.confirm_open || self.save_in_flight
    }

    /// Drop all local state and start over with `content`.
    pub fn reset(&mut self, content: impl Into<String>) {
        self.session.reset(content);
        self.resolver = ConflictResolver::new();
        self.save_in_flight = false;
        self.pending_incoming = None;
        self.confirm_open = false;
    }

    // =========================================================================
    // Local edits and autosave
    // =========================================================================

    /// The user changed the buffer to `content`.
    pub fn edit(&mut self, content: String, now: Instant) {
        self.session.set_buffer(content);
        let deadline = self.tracker.on_edit(&mut self.session, now);
        debug!(document = %self.document, ?deadline, "edit, autosave re-armed");
    }

    /// Fire the autosave if it is due.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        if self.autosave_suspended() {
            return Vec::new();
        }
        match self.tracker.fire(&mut self.session, now) {
            Some(content) => {
                info!(document = %self.document, bytes = content.len(), "autosave firing");
                vec![self.save(content, false)]
            }
            None => Vec::new(),
        }
    }

    fn save(&mut self, content: String, force_overwrite: bool) -> Effect {
        self.save_in_flight = true;
        Effect::Save(SaveRequest {
            content,
            subdomain: self.document.clone(),
            force_overwrite,
            user_key: self.actor.clone(),
        })
    }

    /// A save finished. `request` is what was sent.
    pub fn save_completed(&mut self, request: &SaveRequest, outcome: SaveOutcome) -> Vec<Effect> {
        self.save_in_flight = false;
        let forced = request.force_overwrite;

        match outcome {
            SaveOutcome::Saved => {
                info!(document = %self.document, forced, "content saved");
                vec![
                    Effect::RefreshChildPages,
                    Effect::Notify(Notice::success(SAVED_NOTICE)),
                    Effect::Emit(EditorEvent::Saved { forced }),
                ]
            }
            SaveOutcome::Conflict { server_content } => {
                if forced {
                    error!(document = %self.document, "server reported a conflict on a forced overwrite");
                }
                warn!(document = %self.document, "save conflict");
                let candidate = ConflictCandidate {
                    local_content: request.content.clone(),
                    server_content,
                };
                if self.resolver.open(candidate.clone()) {
                    vec![
                        Effect::Emit(EditorEvent::ConflictOpened(candidate.clone())),
                        Effect::OpenConflictPrompt(candidate),
                    ]
                } else {
                    Vec::new()
                }
            }
            SaveOutcome::Failed { kind, reason } => {
                error!(document = %self.document, kind, reason = %reason, forced, "save failed");
                let mut effects = Vec::new();
                // Forced saves come from the user's own choice; tell them.
                if forced {
                    effects.push(Effect::Notify(Notice::error(format!("Save failed: {reason}"))));
                }
                effects.push(Effect::Emit(EditorEvent::SaveFailed { kind, reason }));
                effects
            }
        }
    }

    // =========================================================================
    // Conflict resolution
    // =========================================================================

    pub fn conflict_answered(&mut self, choice: ConflictChoice) -> Vec<Effect> {
        let Some(resolution) = self.resolver.resolve(choice) else {
            return Vec::new();
        };
        let resolved = Effect::Emit(EditorEvent::ConflictResolved(choice));
        match resolution {
            Resolution::ForceSave { content } => vec![resolved, self.save(content, true)],
            Resolution::PullServer => vec![resolved, Effect::FetchServerContent],
        }
    }

    /// Result of the read requested by [`Effect::FetchServerContent`].
    pub fn server_content_fetched(&mut self, result: Result<String, ClientError>) -> Vec<Effect> {
        match result {
            Ok(content) => {
                info!(document = %self.document, bytes = content.len(), "buffer replaced from server");
                self.session.replace_from_server(content.clone());
                self.pending_incoming = None;
                vec![
                    Effect::Emit(EditorEvent::BufferReplaced {
                        content,
                        origin: ReplaceOrigin::ServerPull,
                    }),
                    Effect::Notify(Notice::info(SERVER_CONTENT_NOTICE)),
                ]
            }
            Err(e) => {
                error!(document = %self.document, error = %e, kind = e.kind(), "failed to fetch server content");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Live updates
    // =========================================================================

    pub fn channel_event(&mut self, event: ChannelEvent) -> Vec<Effect> {
        let next = self.channel.after(&event);
        let mut effects = Vec::new();
        if next != self.channel {
            self.channel = next;
            effects.push(Effect::Emit(EditorEvent::ChannelStateChanged(next)));
        }

        match event {
            ChannelEvent::Message(content) if self.channel == ChannelState::Open => {
                effects.extend(self.incoming(content));
            }
            ChannelEvent::Message(_) => {
                debug!(state = ?self.channel, "ignoring push on inactive channel");
            }
            ChannelEvent::Failed(reason) => {
                error!(document = %self.document, reason = %reason, "live update channel failed");
            }
            ChannelEvent::Opened | ChannelEvent::Closed => {}
        }
        effects
    }

    fn incoming(&mut self, content: String) -> Vec<Effect> {
        if !self.session.is_dirty() {
            debug!(document = %self.document, bytes = content.len(), "applying push to clean buffer");
            self.session.replace_from_server(content.clone());
            // Anything still waiting on confirmation is older than this.
            self.pending_incoming = None;
            return vec![Effect::Emit(EditorEvent::BufferReplaced {
                content,
                origin: ReplaceOrigin::Push,
            })];
        }

        self.pending_incoming = Some(content.clone());
        if self.confirm_open {
            debug!("confirmation already open, newer push replaces the pending one");
            return Vec::new();
        }
        self.confirm_open = true;
        vec![Effect::ConfirmIncoming(content)]
    }

    /// The user's answer to [`Effect::ConfirmIncoming`].
    pub fn incoming_answered(&mut self, accepted: bool) -> Vec<Effect> {
        self.confirm_open = false;
        let Some(content) = self.pending_incoming.take() else {
            debug!("incoming update already superseded");
            return Vec::new();
        };
        if accepted {
            info!(document = %self.document, "applying incoming update over local edits");
            self.session.replace_from_server(content.clone());
            vec![Effect::Emit(EditorEvent::BufferReplaced { content, origin: ReplaceOrigin::Push })]
        } else {
            warn!(document = %self.document, "incoming update declined, keeping local edits");
            vec![Effect::Emit(EditorEvent::IncomingDeclined)]
        }
    }
}

/// Map a child-page fetch to what the sidebar should show.
pub fn child_listing(result: Result<Vec<ChildPage>, ClientError>) -> ChildListing {
    match result {
        Ok(pages) => ChildListing::from_pages(pages),
        Err(e) => {
            error!(error = %e, "failed to load child pages");
            ChildListing::Unavailable
        }
    }
}
