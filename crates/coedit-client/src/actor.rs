//! Editor actor: one task per open document.
//!
//! Provides a `Send+Sync` [`EditorHandle`] over a task that owns the
//! [`SyncCoordinator`]. The task multiplexes user commands, IO completions,
//! push channel events and the autosave deadline; every IO request is
//! spawned so a slow save or an unanswered prompt never blocks typing.
//!
//! ```text
//!   EditorHandle (Send+Sync)   mpsc     EditorActor (tokio task)
//!   ┌─────────────────────┐  ───────▶  ┌─────────────────────────────┐
//!   │ .edit() / .update() │            │ SyncCoordinator             │
//!   │ .snapshot()         │  ◀───────  │ select! { commands,         │
//!   │ .subscribe()        │  oneshot   │   completions, push, timer }│
//!   └─────────────────────┘            └─────────────────────────────┘
//!            ▲  broadcast<EditorEvent>            │ spawn
//!            └────────────────────────────────────┤
//!                                  PageApi / UserPrompt / ChildPageView
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span};

use crate::channel::{ChannelEvent, ChannelState, LiveChannel};
use crate::coordinator::{Effect, EditorEvent, SyncCoordinator, child_listing};
use crate::document::DocumentRef;
use crate::error::ClientError;
use crate::persistence::{PageApi, SaveOutcome, SaveRequest};
use crate::resolver::{ConflictCandidate, ConflictChoice};
use crate::ui::{ChildPageView, NotifySink, UserPrompt};

/// Capacity of the [`EditorEvent`] broadcast. Slow subscribers see `Lagged`.
const EVENT_BUFFER: usize = 256;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("editor shut down")]
    Shutdown,
}

// ============================================================================
// Services and commands
// ============================================================================

/// Everything the editor talks to.
#[derive(Clone)]
pub struct EditorServices {
    pub api: Arc<dyn PageApi>,
    pub prompt: Arc<dyn UserPrompt>,
    pub notify: Arc<dyn NotifySink>,
    pub children: Arc<dyn ChildPageView>,
}

/// Point-in-time view of the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub document: DocumentRef,
    pub buffer: String,
    pub dirty: bool,
    pub channel: ChannelState,
    pub conflict: Option<ConflictCandidate>,
    pub save_in_flight: bool,
}

/// Rewrites the current buffer; `None` leaves it untouched.
type BufferUpdate = Box<dyn FnOnce(&str) -> Option<String> + Send>;

enum EditorCommand {
    Edit { content: String },
    Update { apply: BufferUpdate },
    Snapshot { reply: oneshot::Sender<EditorSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Results of spawned IO, fed back into the coordinator.
enum Completion {
    Saved { request: SaveRequest, outcome: SaveOutcome },
    ConflictAnswered(ConflictChoice),
    IncomingAnswered(bool),
    ServerContent(Result<String, ClientError>),
}

// ============================================================================
// EditorHandle (Send + Sync public API)
// ============================================================================

#[derive(Clone)]
pub struct EditorHandle {
    document: DocumentRef,
    tx: mpsc::UnboundedSender<EditorCommand>,
    events: broadcast::Sender<EditorEvent>,
}

impl EditorHandle {
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// The user changed the buffer to `content`.
    pub fn edit(&self, content: impl Into<String>) -> Result<(), ActorError> {
        self.tx
            .send(EditorCommand::Edit { content: content.into() })
            .map_err(|_| ActorError::Shutdown)
    }

    /// Edit relative to the buffer as the editor holds it when the command
    /// runs, so a push that lands first is not overwritten by a stale copy.
    pub fn update(
        &self,
        apply: impl FnOnce(&str) -> Option<String> + Send + 'static,
    ) -> Result<(), ActorError> {
        self.tx
            .send(EditorCommand::Update { apply: Box::new(apply) })
            .map_err(|_| ActorError::Shutdown)
    }

    pub async fn snapshot(&self) -> Result<EditorSnapshot, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EditorCommand::Snapshot { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Current buffer content.
    pub async fn content(&self) -> Result<String, ActorError> {
        Ok(self.snapshot().await?.buffer)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Stop the editor. Pending saves and open prompts are abandoned.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EditorCommand::Shutdown { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }
}

// ============================================================================
// EditorActor (internal)
// ============================================================================

struct EditorActor {
    coordinator: SyncCoordinator,
    services: EditorServices,
    events: broadcast::Sender<EditorEvent>,
    completions: mpsc::UnboundedSender<Completion>,
    tasks: JoinSet<()>,
}

impl EditorActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<EditorCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut channel: Option<LiveChannel>,
    ) {
        info!(document = %self.coordinator.document(), "editor started");

        loop {
            let deadline = self.coordinator.next_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(EditorCommand::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(done) = completions.recv() => {
                    let effects = self.complete(done);
                    self.apply(effects);
                }
                event = next_channel_event(&mut channel) => {
                    let event = event.unwrap_or_else(|| {
                        debug!("push channel source dropped");
                        channel = None;
                        ChannelEvent::Closed
                    });
                    let span = info_span!("push.event", document = %self.coordinator.document());
                    let effects = span.in_scope(|| self.coordinator.channel_event(event));
                    self.apply(effects);
                }
                _ = sleep_until_opt(deadline) => {
                    let effects = self.coordinator.tick(Instant::now());
                    self.apply(effects);
                }
            }

            while self.tasks.try_join_next().is_some() {}
        }

        info!(document = %self.coordinator.document(), "editor stopped");
    }

    fn handle_command(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::Edit { content } => self.coordinator.edit(content, Instant::now()),
            EditorCommand::Update { apply } => {
                if let Some(next) = apply(self.coordinator.session().buffer()) {
                    self.coordinator.edit(next, Instant::now());
                }
            }
            EditorCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            EditorCommand::Shutdown { .. } => {}
        }
    }

    fn snapshot(&self) -> EditorSnapshot {
        let session = self.coordinator.session();
        EditorSnapshot {
            document: self.coordinator.document().clone(),
            buffer: session.buffer().to_string(),
            dirty: session.is_dirty(),
            channel: self.coordinator.channel_state(),
            conflict: self.coordinator.conflict().cloned(),
            save_in_flight: self.coordinator.is_save_in_flight(),
        }
    }

    fn complete(&mut self, done: Completion) -> Vec<Effect> {
        match done {
            Completion::Saved { request, outcome } => {
                self.coordinator.save_completed(&request, outcome)
            }
            Completion::ConflictAnswered(choice) => {
                let _span = info_span!("conflict.resolve", ?choice).entered();
                self.coordinator.conflict_answered(choice)
            }
            Completion::IncomingAnswered(accepted) => self.coordinator.incoming_answered(accepted),
            Completion::ServerContent(result) => self.coordinator.server_content_fetched(result),
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Save(request) => {
                    let api = self.services.api.clone();
                    let tx = self.completions.clone();
                    self.tasks.spawn(async move {
                        let outcome = SaveOutcome::from(api.save(&request).await);
                        let _ = tx.send(Completion::Saved { request, outcome });
                    });
                }
                Effect::OpenConflictPrompt(candidate) => {
                    let prompt = self.services.prompt.clone();
                    let tx = self.completions.clone();
                    let span = info_span!("conflict.prompt", document = %self.coordinator.document());
                    self.tasks.spawn(
                        async move {
                            let choice = prompt.resolve_conflict(candidate).await;
                            let _ = tx.send(Completion::ConflictAnswered(choice));
                        }
                        .instrument(span),
                    );
                }
                Effect::ConfirmIncoming(content) => {
                    let prompt = self.services.prompt.clone();
                    let tx = self.completions.clone();
                    let span = info_span!("push.confirm", document = %self.coordinator.document());
                    self.tasks.spawn(
                        async move {
                            let accepted = prompt.confirm_incoming(content).await;
                            let _ = tx.send(Completion::IncomingAnswered(accepted));
                        }
                        .instrument(span),
                    );
                }
                Effect::FetchServerContent => {
                    let api = self.services.api.clone();
                    let document = self.coordinator.document().clone();
                    let tx = self.completions.clone();
                    self.tasks.spawn(async move {
                        let result = api.fetch_content(&document).await;
                        let _ = tx.send(Completion::ServerContent(result));
                    });
                }
                Effect::RefreshChildPages => {
                    let api = self.services.api.clone();
                    let view = self.services.children.clone();
                    let document = self.coordinator.document().clone();
                    self.tasks.spawn(async move {
                        let listing = child_listing(api.child_pages(&document).await);
                        view.refresh(&document, &listing);
                    });
                }
                Effect::Notify(notice) => self.services.notify.show(&notice),
                Effect::Emit(event) => {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }
}

async fn next_channel_event(channel: &mut Option<LiveChannel>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Spawn the editor task for `coordinator`.
///
/// With `channel = None` live updates are off and the channel state reads
/// `Closed` from the start.
pub fn spawn_editor(
    mut coordinator: SyncCoordinator,
    services: EditorServices,
    channel: Option<LiveChannel>,
) -> (EditorHandle, JoinHandle<()>) {
    let (tx, commands) = mpsc::unbounded_channel();
    let (completions_tx, completions) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_BUFFER);

    if channel.is_none() {
        coordinator.channel_event(ChannelEvent::Closed);
    }

    let handle = EditorHandle {
        document: coordinator.document().clone(),
        tx,
        events: events.clone(),
    };
    let actor = EditorActor {
        coordinator,
        services,
        events,
        completions: completions_tx,
        tasks: JoinSet::new(),
    };
    let task = tokio::spawn(actor.run(commands, completions, channel));
    (handle, task)
}
