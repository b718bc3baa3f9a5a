//! Terminal implementations of the editor's front-end traits.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tracing::warn;

use coedit_client::constants::{CHILD_PAGES_ERROR_NOTICE, NO_CHILD_PAGES_NOTICE};
use coedit_client::{
    ChannelState, ChildListing, ChildPageView, ConflictCandidate, ConflictChoice, DocumentRef,
    EditorEvent, Notice, NoticeLevel, NotifySink, ReplaceOrigin, UserPrompt,
};

/// Writes to a terminal and answers prompts from routed stdin lines.
pub struct Terminal {
    out: Mutex<Box<dyn Write + Send>>,
    /// Open prompts, oldest first.
    answers: Mutex<VecDeque<oneshot::Sender<String>>>,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    /// Terminal on stderr.
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self { out: Mutex::new(Box::new(out)), answers: Mutex::default() }
    }

    fn out(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.out.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn answers(&self) -> MutexGuard<'_, VecDeque<oneshot::Sender<String>>> {
        self.answers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn say(&self, text: &str) {
        let mut out = self.out();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    pub fn pending_prompts(&self) -> usize {
        self.answers().len()
    }

    /// Hand `line` to the oldest open prompt. Gives the line back when no
    /// prompt is waiting for it.
    pub fn route_line(&self, mut line: String) -> Option<String> {
        let mut answers = self.answers();
        while let Some(tx) = answers.pop_front() {
            match tx.send(line) {
                Ok(()) => return None,
                // Prompt was abandoned; try the next one.
                Err(unsent) => line = unsent,
            }
        }
        Some(line)
    }

    /// Abandon every open prompt (stdin closed).
    pub fn close_prompts(&self) {
        self.answers().clear();
    }

    /// `None` when the prompt was closed without an answer.
    async fn ask(&self, question: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.answers().push_back(tx);
        self.say(question);
        rx.await.ok()
    }

    fn show_replaced(&self, origin: ReplaceOrigin, content: &str) {
        let source = match origin {
            ReplaceOrigin::Push => "another editor",
            ReplaceOrigin::ServerPull => "the server",
        };
        self.say(&format!("── page replaced by {source} ──\n{content}\n──"));
    }
}

fn parse_conflict_choice(answer: &str) -> Option<ConflictChoice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "m" | "mine" | "k" | "keep" => Some(ConflictChoice::KeepMine),
        "t" | "theirs" | "d" | "discard" => Some(ConflictChoice::DiscardMine),
        _ => None,
    }
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl UserPrompt for Terminal {
    async fn resolve_conflict(&self, candidate: ConflictCandidate) -> ConflictChoice {
        self.say(&format!(
            "Someone else saved this page first.\n── yours ──\n{}\n── theirs ──\n{}\n──",
            candidate.local_content, candidate.server_content
        ));
        loop {
            match self.ask("keep [m]ine or take [t]heirs?").await {
                Some(answer) => {
                    if let Some(choice) = parse_conflict_choice(&answer) {
                        return choice;
                    }
                }
                // Unanswered: keep the server copy rather than overwrite it.
                None => return ConflictChoice::DiscardMine,
            }
        }
    }

    async fn confirm_incoming(&self, _content: String) -> bool {
        self.ask("The page changed elsewhere. Load it and drop your unsaved edits? [y/N]")
            .await
            .is_some_and(|answer| parse_yes(&answer))
    }
}

impl NotifySink for Terminal {
    fn show(&self, notice: &Notice) {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        self.say(&format!("[{tag}] {}", notice.message));
    }
}

impl ChildPageView for Terminal {
    fn refresh(&self, document: &DocumentRef, listing: &ChildListing) {
        match listing {
            ChildListing::Pages(pages) => {
                let mut text = format!("child pages of {document}:");
                for page in pages {
                    text.push_str(&format!("\n  {} ({})", page.file_name, page.full_path));
                }
                self.say(&text);
            }
            ChildListing::Empty => self.say(NO_CHILD_PAGES_NOTICE),
            ChildListing::Unavailable => self.say(CHILD_PAGES_ERROR_NOTICE),
        }
    }
}

/// Print editor events until the editor goes away.
pub async fn print_events(terminal: Arc<Terminal>, mut events: broadcast::Receiver<EditorEvent>) {
    loop {
        match events.recv().await {
            Ok(EditorEvent::BufferReplaced { content, origin }) => {
                terminal.show_replaced(origin, &content)
            }
            Ok(EditorEvent::ChannelStateChanged(ChannelState::Closed)) => {
                terminal.say("live updates off")
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => warn!(missed, "terminal fell behind editor events"),
            Err(RecvError::Closed) => break,
        }
    }
}
