//! Editor actor flows against in-process fakes
//!
//! Time is paused: the runtime auto-advances the clock whenever every task is
//! idle, so a `sleep(6s)` runs the autosave deadline and everything it
//! triggers before returning.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use coedit_client::{
    ActorError, ActorToken, ChannelEvent, ChannelState, ChildListing, ChildPage, ChildPageView,
    ClientError, ConflictCandidate, ConflictChoice, DebouncedEditTracker, DocumentRef,
    EditorEvent, EditorHandle, EditorServices, LiveChannel, Notice, NoticeLevel, NotifySink,
    PageApi, ReplaceOrigin, SaveRequest, SyncCoordinator, UserPrompt, spawn_editor,
};

// ============================================================================
// Fakes
// ============================================================================

enum SaveReply {
    Conflict(&'static str),
    Fail,
}

#[derive(Default)]
struct FakeApi {
    saves: Mutex<Vec<SaveRequest>>,
    /// Replies for upcoming saves; empty means success.
    replies: Mutex<VecDeque<SaveReply>>,
    server_content: Mutex<String>,
    fetches: Mutex<usize>,
}

impl FakeApi {
    fn replying(replies: impl IntoIterator<Item = SaveReply>) -> Self {
        let api = Self::default();
        api.replies.lock().unwrap().extend(replies);
        api
    }

    fn saves(&self) -> Vec<SaveRequest> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageApi for FakeApi {
    async fn save(&self, request: &SaveRequest) -> Result<(), ClientError> {
        self.saves.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            None => Ok(()),
            Some(SaveReply::Conflict(server)) => {
                Err(ClientError::VersionConflict { server_content: server.to_string() })
            }
            Some(SaveReply::Fail) => {
                Err(ClientError::ServerRejection { status: 500, body: "disk full".into() })
            }
        }
    }

    async fn fetch_content(&self, _document: &DocumentRef) -> Result<String, ClientError> {
        *self.fetches.lock().unwrap() += 1;
        Ok(self.server_content.lock().unwrap().clone())
    }

    async fn child_pages(&self, document: &DocumentRef) -> Result<Vec<ChildPage>, ClientError> {
        Ok(vec![ChildPage {
            file_name: "child".into(),
            full_path: format!("{document}/child"),
        }])
    }

    async fn open_page(&self, _document: &DocumentRef) -> Result<(), ClientError> {
        Ok(())
    }

    async fn access_or_create(&self, subdomain: &str) -> Result<String, ClientError> {
        Ok(format!("/editor/{subdomain}"))
    }
}

/// Answers every question the same way and remembers what it was asked.
struct ScriptedPrompt {
    choice: ConflictChoice,
    accept_incoming: bool,
    conflicts: Mutex<Vec<ConflictCandidate>>,
    confirmations: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    fn new(choice: ConflictChoice, accept_incoming: bool) -> Self {
        Self {
            choice,
            accept_incoming,
            conflicts: Mutex::default(),
            confirmations: Mutex::default(),
        }
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn resolve_conflict(&self, candidate: ConflictCandidate) -> ConflictChoice {
        self.conflicts.lock().unwrap().push(candidate);
        self.choice
    }

    async fn confirm_incoming(&self, content: String) -> bool {
        self.confirmations.lock().unwrap().push(content);
        self.accept_incoming
    }
}

#[derive(Default)]
struct Screen {
    notices: Mutex<Vec<Notice>>,
    listings: Mutex<Vec<ChildListing>>,
}

impl NotifySink for Screen {
    fn show(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

impl ChildPageView for Screen {
    fn refresh(&self, _document: &DocumentRef, listing: &ChildListing) {
        self.listings.lock().unwrap().push(listing.clone());
    }
}

struct Harness {
    editor: EditorHandle,
    events: broadcast::Receiver<EditorEvent>,
    api: Arc<FakeApi>,
    prompt: Arc<ScriptedPrompt>,
    screen: Arc<Screen>,
    channel_tx: mpsc::Sender<ChannelEvent>,
}

impl Harness {
    fn start(initial: &str, api: FakeApi, prompt: ScriptedPrompt) -> Self {
        let api = Arc::new(api);
        let prompt = Arc::new(prompt);
        let screen = Arc::new(Screen::default());
        let (channel_tx, rx) = mpsc::channel(16);

        let coordinator = SyncCoordinator::new(
            DocumentRef::new("notes"),
            ActorToken::new("me"),
            DebouncedEditTracker::new(Duration::from_millis(5000)),
            initial,
        );
        let services = EditorServices {
            api: api.clone(),
            prompt: prompt.clone(),
            notify: screen.clone(),
            children: screen.clone(),
        };
        let (editor, _task) = spawn_editor(coordinator, services, Some(LiveChannel::from_events(rx)));
        let events = editor.subscribe();
        Self { editor, events, api, prompt, screen, channel_tx }
    }

    async fn push(&self, event: ChannelEvent) {
        self.channel_tx.send(event).await.unwrap();
        sleep(Duration::from_millis(10)).await;
    }

    fn drain_events(&mut self) -> Vec<EditorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Records the name of every span opened while installed.
#[derive(Clone, Default)]
struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

impl<S: tracing::Subscriber> Layer<S> for SpanNames {
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        self.0.lock().unwrap().push(attrs.metadata().name());
    }
}

fn keep_mine() -> ScriptedPrompt {
    ScriptedPrompt::new(ConflictChoice::KeepMine, false)
}

// ============================================================================
// Autosave
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_save() {
    let h = Harness::start("", FakeApi::default(), keep_mine());

    for text in ["h", "he", "hel", "hell", "hello"] {
        h.editor.edit(text).unwrap();
        sleep(Duration::from_millis(1000)).await;
    }
    assert!(h.api.saves().is_empty());

    sleep(Duration::from_millis(4100)).await;
    let saves = h.api.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].content, "hello");
    assert!(!saves[0].force_overwrite);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.saves().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_save_success_refreshes_children_and_notifies() {
    let h = Harness::start("", FakeApi::default(), keep_mine());

    h.editor.edit("hello").unwrap();
    sleep(Duration::from_secs(6)).await;

    let notices = h.screen.notices.lock().unwrap().clone();
    assert_eq!(notices, vec![Notice::success("Content saved!")]);
    assert!(matches!(h.screen.listings.lock().unwrap().as_slice(), [ChildListing::Pages(_)]));

    let snapshot = h.editor.snapshot().await.unwrap();
    assert!(!snapshot.dirty);
    assert!(!snapshot.save_in_flight);
    assert!(snapshot.conflict.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_failure_keeps_buffer_quietly() {
    let mut h = Harness::start("", FakeApi::replying([SaveReply::Fail]), keep_mine());

    h.editor.edit("draft").unwrap();
    sleep(Duration::from_secs(6)).await;

    assert_eq!(h.api.saves().len(), 1);
    assert_eq!(h.editor.content().await.unwrap(), "draft");
    assert!(h.screen.notices.lock().unwrap().is_empty());
    assert!(
        h.drain_events()
            .iter()
            .any(|e| matches!(e, EditorEvent::SaveFailed { kind: "server_rejection", .. }))
    );

    // No retry until the next edit.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.saves().len(), 1);
}

// ============================================================================
// Conflicts
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_conflict_keep_mine_overwrites() {
    let mut h = Harness::start("", FakeApi::replying([SaveReply::Conflict("world")]), keep_mine());

    h.editor.edit("hello").unwrap();
    sleep(Duration::from_secs(6)).await;

    let saves = h.api.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!((saves[0].content.as_str(), saves[0].force_overwrite), ("hello", false));
    assert_eq!((saves[1].content.as_str(), saves[1].force_overwrite), ("hello", true));
    assert_eq!(saves[1].user_key, ActorToken::new("me"));

    let conflicts = h.prompt.conflicts.lock().unwrap().clone();
    assert_eq!(
        conflicts,
        vec![ConflictCandidate { local_content: "hello".into(), server_content: "world".into() }]
    );
    assert_eq!(h.editor.content().await.unwrap(), "hello");

    let events = h.drain_events();
    assert!(events.contains(&EditorEvent::ConflictResolved(ConflictChoice::KeepMine)));
    assert!(events.contains(&EditorEvent::Saved { forced: true }));
}

#[tokio::test(start_paused = true)]
async fn test_conflict_discard_mine_loads_server() {
    let api = FakeApi::replying([SaveReply::Conflict("world")]);
    *api.server_content.lock().unwrap() = "world, edited".into();
    let h = Harness::start("", api, ScriptedPrompt::new(ConflictChoice::DiscardMine, false));

    h.editor.edit("hello").unwrap();
    sleep(Duration::from_secs(6)).await;

    assert_eq!(h.api.saves().len(), 1);
    assert_eq!(*h.api.fetches.lock().unwrap(), 1);

    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.buffer, "world, edited");
    assert!(!snapshot.dirty);
    assert!(
        h.screen
            .notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.level == NoticeLevel::Info && n.message == "Content updated from server.")
    );

    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.saves().len(), 1);
}

// ============================================================================
// Live updates
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_push_replaces_idle_buffer() {
    let mut h = Harness::start("old", FakeApi::default(), keep_mine());

    h.push(ChannelEvent::Opened).await;
    h.push(ChannelEvent::Message("update A".into())).await;

    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.channel, ChannelState::Open);
    assert_eq!(snapshot.buffer, "update A");
    assert!(h.prompt.confirmations.lock().unwrap().is_empty());
    assert!(h.drain_events().contains(&EditorEvent::BufferReplaced {
        content: "update A".into(),
        origin: ReplaceOrigin::Push,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_declined_push_keeps_local_edits() {
    let h = Harness::start("", FakeApi::default(), ScriptedPrompt::new(ConflictChoice::KeepMine, false));
    h.push(ChannelEvent::Opened).await;

    h.editor.edit("mine").unwrap();
    h.push(ChannelEvent::Message("theirs".into())).await;

    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.buffer, "mine");
    assert!(snapshot.dirty);
    assert_eq!(*h.prompt.confirmations.lock().unwrap(), vec!["theirs".to_string()]);

    // The pending autosave still goes out.
    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.api.saves()[0].content, "mine");
}

#[tokio::test(start_paused = true)]
async fn test_accepted_push_cancels_autosave() {
    let h = Harness::start("", FakeApi::default(), ScriptedPrompt::new(ConflictChoice::KeepMine, true));
    h.push(ChannelEvent::Opened).await;

    h.editor.edit("mine").unwrap();
    h.push(ChannelEvent::Message("theirs".into())).await;

    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.buffer, "theirs");
    assert!(!snapshot.dirty);

    sleep(Duration::from_secs(60)).await;
    assert!(h.api.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_applies_to_pushed_content() {
    let h = Harness::start("old\n", FakeApi::default(), keep_mine());
    h.push(ChannelEvent::Opened).await;
    h.push(ChannelEvent::Message("theirs\n".into())).await;

    h.editor.update(|buffer| Some(format!("{buffer}mine\n"))).unwrap();
    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.buffer, "theirs\nmine\n");
    assert!(snapshot.dirty);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.api.saves()[0].content, "theirs\nmine\n");
}

#[tokio::test(start_paused = true)]
async fn test_update_returning_none_is_not_an_edit() {
    let h = Harness::start("page", FakeApi::default(), keep_mine());

    h.editor.update(|_| None).unwrap();
    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.buffer, "page");
    assert!(!snapshot.dirty);

    sleep(Duration::from_secs(60)).await;
    assert!(h.api.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_channel_failure_leaves_saving_working() {
    let h = Harness::start("", FakeApi::default(), keep_mine());
    h.push(ChannelEvent::Opened).await;
    h.push(ChannelEvent::Failed("connection reset".into())).await;
    assert_eq!(h.editor.snapshot().await.unwrap().channel, ChannelState::Closed);

    // Late messages are ignored once closed.
    h.push(ChannelEvent::Message("late".into())).await;
    assert_eq!(h.editor.content().await.unwrap(), "");

    h.editor.edit("still saving").unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.api.saves()[0].content, "still saving");
}

#[tokio::test(start_paused = true)]
async fn test_live_updates_off_reads_closed() {
    let coordinator = SyncCoordinator::new(
        DocumentRef::new("notes"),
        ActorToken::new("me"),
        DebouncedEditTracker::default(),
        "",
    );
    let screen = Arc::new(Screen::default());
    let services = EditorServices {
        api: Arc::new(FakeApi::default()),
        prompt: Arc::new(keep_mine()),
        notify: screen.clone(),
        children: screen,
    };
    let (editor, _task) = spawn_editor(coordinator, services, None);
    assert_eq!(editor.snapshot().await.unwrap().channel, ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_rejects_further_commands() {
    let coordinator = SyncCoordinator::new(
        DocumentRef::new("notes"),
        ActorToken::new("me"),
        DebouncedEditTracker::default(),
        "",
    );
    let screen = Arc::new(Screen::default());
    let services = EditorServices {
        api: Arc::new(FakeApi::default()),
        prompt: Arc::new(keep_mine()),
        notify: screen.clone(),
        children: screen,
    };
    let (editor, task) = spawn_editor(coordinator, services, None);

    editor.shutdown().await.unwrap();
    task.await.unwrap();
    assert!(matches!(editor.edit("x"), Err(ActorError::Shutdown)));
    assert!(matches!(editor.snapshot().await, Err(ActorError::Shutdown)));
}

// ============================================================================
// Tracing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_prompts_and_pushes_open_spans() {
    let names = SpanNames::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(names.clone()));

    let h = Harness::start("", FakeApi::replying([SaveReply::Conflict("world")]), keep_mine());
    h.push(ChannelEvent::Opened).await;

    h.editor.edit("hello").unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.api.saves().len(), 2);

    h.editor.edit("more").unwrap();
    h.push(ChannelEvent::Message("theirs".into())).await;
    assert_eq!(*h.prompt.confirmations.lock().unwrap(), vec!["theirs".to_string()]);

    let seen = names.0.lock().unwrap().clone();
    for name in ["conflict.prompt", "conflict.resolve", "push.event", "push.confirm"] {
        assert!(seen.contains(&name), "no {name} span in {seen:?}");
    }
}
