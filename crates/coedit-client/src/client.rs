//! Opening a document for editing.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::actor::{EditorHandle, EditorServices, spawn_editor};
use crate::channel::{LiveChannel, push_url};
use crate::config::ClientConfig;
use crate::coordinator::{SyncCoordinator, child_listing};
use crate::document::DocumentRef;
use crate::error::ClientError;
use crate::identity::IdentityProvider;
use crate::persistence::HttpPageApi;
use crate::tracker::DebouncedEditTracker;

/// Build the HTTP [`PageApi`](crate::persistence::PageApi) described by `config`.
pub fn http_api(config: &ClientConfig) -> Result<Arc<HttpPageApi>, ClientError> {
    let api = HttpPageApi::new(config.server_url.clone(), config.request_timeout())?
        .with_path_prefix(config.path_prefix.clone());
    Ok(Arc::new(api))
}

/// Bootstrap `document` and start its editor.
///
/// 1. Visit the editor page so the server creates any missing pages.
/// 2. Load the initial buffer.
/// 3. Render the child page list once.
/// 4. Open the push channel, unless `live_updates` is off.
///
/// A failed page visit is logged and ignored; a failed content load aborts.
#[tracing::instrument(skip_all, name = "editor.open", fields(document = %document))]
pub async fn open_editor(
    config: &ClientConfig,
    document: DocumentRef,
    identity: &IdentityProvider,
    services: EditorServices,
) -> Result<(EditorHandle, JoinHandle<()>), ClientError> {
    if let Err(e) = services.api.open_page(&document).await {
        warn!(error = %e, "editor page visit failed, continuing");
    }

    let initial = services.api.fetch_content(&document).await?;
    info!(bytes = initial.len(), "initial content loaded");

    let listing = child_listing(services.api.child_pages(&document).await);
    services.children.refresh(&document, &listing);

    let channel = if config.live_updates {
        Some(LiveChannel::open(push_url(&config.server_url, &document)?))
    } else {
        info!("live updates disabled");
        None
    };

    let coordinator = SyncCoordinator::new(
        document,
        identity.actor_token(),
        DebouncedEditTracker::new(config.debounce()),
        initial,
    );
    Ok(spawn_editor(coordinator, services, channel))
}

/// [`open_editor`] for a navigation path such as `/editor/notes/today/`.
pub async fn open_editor_at(
    config: &ClientConfig,
    path: &str,
    identity: &IdentityProvider,
    services: EditorServices,
) -> Result<(EditorHandle, JoinHandle<()>), ClientError> {
    let document = DocumentRef::from_path(path, &config.path_prefix);
    open_editor(config, document, identity, services).await
}
