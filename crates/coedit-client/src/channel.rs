//! Live update channel: the server pushes full document content over a
//! websocket whenever someone saves.
//!
//! The channel is opened once and never reopened. A close or error leaves it
//! `Closed` for the rest of the session; saving and conflict resolution keep
//! working without it.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::PUSH_ENDPOINT;
use crate::document::DocumentRef;
use crate::error::ClientError;

/// Capacity of the event queue between the socket task and the editor.
const CHANNEL_EVENT_BUFFER: usize = 64;

/// Connection lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Events from the push channel, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    /// Full new content of the document.
    Message(String),
    Closed,
    Failed(String),
}

impl ChannelState {
    /// State after `event`. `Closed` is terminal.
    pub fn after(self, event: &ChannelEvent) -> ChannelState {
        match (self, event) {
            (ChannelState::Closed, _) => ChannelState::Closed,
            (_, ChannelEvent::Opened) => ChannelState::Open,
            (state, ChannelEvent::Message(_)) => state,
            (_, ChannelEvent::Closed | ChannelEvent::Failed(_)) => ChannelState::Closed,
        }
    }
}

/// Push socket URL for `document`: `/ws/<document>` on the server, with
/// `http` mapped to `ws` and `https` to `wss`.
pub fn push_url(server: &Url, document: &DocumentRef) -> Result<Url, ClientError> {
    let mut url = server.join(&format!("{PUSH_ENDPOINT}/{document}"))?;
    let scheme = if server.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| ClientError::Channel(format!("cannot use {scheme} for {server}")))?;
    Ok(url)
}

/// A running push connection. Dropping it tears the socket down.
pub struct LiveChannel {
    events: mpsc::Receiver<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Start connecting in the background. Events (including the connect
    /// failure, if any) arrive through [`LiveChannel::recv`].
    pub fn open(url: Url) -> Self {
        let (tx, events) = mpsc::channel(CHANNEL_EVENT_BUFFER);
        let task = tokio::spawn(run_channel(url, tx));
        Self { events, task: Some(task) }
    }

    /// Wrap an externally driven event source (another transport, or a test).
    pub fn from_events(events: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { events, task: None }
    }

    /// Next event; `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_channel(url: Url, tx: mpsc::Sender<ChannelEvent>) {
    info!(url = %url, "connecting live update channel");

    let mut stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(error = %e, url = %url, "live update channel failed to connect");
            let _ = tx.send(ChannelEvent::Failed(e.to_string())).await;
            return;
        }
    };

    info!(url = %url, "live update channel open");
    if tx.send(ChannelEvent::Opened).await.is_err() {
        return;
    }

    let terminal = loop {
        let event = match stream.next().await {
            Some(Ok(Message::Text(text))) => ChannelEvent::Message(text.as_str().to_owned()),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => ChannelEvent::Message(text),
                Err(e) => {
                    warn!(error = %e, "dropping non-UTF-8 push frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "server closed live update channel");
                break ChannelEvent::Closed;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "live update channel error");
                break ChannelEvent::Failed(e.to_string());
            }
            None => break ChannelEvent::Closed,
        };
        if tx.send(event).await.is_err() {
            debug!("editor gone, stopping live update channel");
            return;
        }
    };

    warn!("live update channel closed, live updates disabled for this session");
    let _ = tx.send(terminal).await;
}
