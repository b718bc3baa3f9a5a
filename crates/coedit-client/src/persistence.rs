//! Page server API: save, fetch, child listing.
//!
//! [`PageApi`] is the seam the editor actor talks through; [`HttpPageApi`] is
//! the real implementation over `reqwest`. Responses are classified into the
//! [`ClientError`] taxonomy here so nothing above this layer looks at status
//! codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    ACCESS_ENDPOINT, CHILDREN_ENDPOINT, CONTENT_ENDPOINT, DEFAULT_PATH_PREFIX, SAVE_ENDPOINT,
};
use crate::document::{ChildPage, DocumentRef};
use crate::error::ClientError;
use crate::identity::ActorToken;

/// Body of `POST /save_page_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub content: String,
    pub subdomain: DocumentRef,
    pub force_overwrite: bool,
    pub user_key: ActorToken,
}

/// How a save attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The server holds different content (HTTP 409).
    Conflict { server_content: String },
    /// Anything else. Logged, never retried.
    Failed { kind: &'static str, reason: String },
}

impl From<Result<(), ClientError>> for SaveOutcome {
    fn from(result: Result<(), ClientError>) -> Self {
        match result {
            Ok(()) => SaveOutcome::Saved,
            Err(ClientError::VersionConflict { server_content }) => {
                SaveOutcome::Conflict { server_content }
            }
            Err(e) => SaveOutcome::Failed { kind: e.kind(), reason: e.to_string() },
        }
    }
}

/// `{content}` bodies from the content endpoint and from 409 responses.
#[derive(Debug, Deserialize)]
struct ContentBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChildPagesBody {
    #[serde(default)]
    child_pages: Option<Vec<ChildPage>>,
}

#[derive(Debug, Serialize)]
struct AccessRequest<'a> {
    subdomain: &'a str,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    #[serde(rename = "baseURL")]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Server operations the editor needs.
#[async_trait]
pub trait PageApi: Send + Sync {
    /// Save content. `Err(VersionConflict)` on 409.
    async fn save(&self, request: &SaveRequest) -> Result<(), ClientError>;

    /// Current server content; missing content reads as `""`.
    async fn fetch_content(&self, document: &DocumentRef) -> Result<String, ClientError>;

    /// Direct children of the document.
    async fn child_pages(&self, document: &DocumentRef) -> Result<Vec<ChildPage>, ClientError>;

    /// Visit the editor page so the server creates any missing pages on the path.
    async fn open_page(&self, document: &DocumentRef) -> Result<(), ClientError>;

    /// Resolve a page name to its editor path (`/editor/<name>`).
    async fn access_or_create(&self, subdomain: &str) -> Result<String, ClientError>;
}

/// [`PageApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPageApi {
    client: reqwest::Client,
    base: Url,
    path_prefix: String,
}

impl HttpPageApi {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base, path_prefix: DEFAULT_PATH_PREFIX.to_string() })
    }

    /// Editor page prefix used by [`PageApi::open_page`].
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    /// Attach the W3C `traceparent` of the current span, when there is one.
    fn traced(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let (traceparent, tracestate) = coedit_telemetry::inject_trace_context();
        if traceparent.is_empty() {
            return builder;
        }
        let builder = builder.header("traceparent", traceparent);
        if tracestate.is_empty() { builder } else { builder.header("tracestate", tracestate) }
    }
}

/// Turn a non-success response into a [`ClientError::ServerRejection`].
async fn rejection(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
    ClientError::ServerRejection { status, body }
}

#[async_trait]
impl PageApi for HttpPageApi {
    #[tracing::instrument(
        skip(self, request),
        name = "save.request",
        fields(document = %request.subdomain, force = request.force_overwrite, bytes = request.content.len())
    )]
    async fn save(&self, request: &SaveRequest) -> Result<(), ClientError> {
        let url = self.endpoint(SAVE_ENDPOINT)?;
        let response = self
            .traced(self.client.post(url))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "save accepted");
            return Ok(());
        }
        if status == StatusCode::CONFLICT {
            let body: ContentBody = response
                .json()
                .await
                .map_err(|e| ClientError::Decode(format!("conflict body: {e}")))?;
            warn!("save rejected with version conflict");
            return Err(ClientError::VersionConflict {
                server_content: body.content.unwrap_or_default(),
            });
        }
        Err(rejection(response).await)
    }

    #[tracing::instrument(skip_all, name = "fetch.content", fields(document = %document))]
    async fn fetch_content(&self, document: &DocumentRef) -> Result<String, ClientError> {
        let url = self.endpoint(&format!("{CONTENT_ENDPOINT}/{document}"))?;
        let response = self
            .traced(self.client.get(url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body: ContentBody = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("content body: {e}")))?;
        Ok(body.content.unwrap_or_default())
    }

    #[tracing::instrument(skip_all, name = "fetch.children", fields(document = %document))]
    async fn child_pages(&self, document: &DocumentRef) -> Result<Vec<ChildPage>, ClientError> {
        let mut url = self.endpoint(CHILDREN_ENDPOINT)?;
        url.query_pairs_mut().append_pair("fullpath", document.as_str());
        let response = self
            .traced(self.client.get(url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body: ChildPagesBody = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("child pages body: {e}")))?;
        Ok(body.child_pages.unwrap_or_default())
    }

    #[tracing::instrument(skip_all, name = "fetch.page", fields(document = %document))]
    async fn open_page(&self, document: &DocumentRef) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("{}{document}", self.path_prefix))?;
        let response = self.traced(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), name = "fetch.access")]
    async fn access_or_create(&self, subdomain: &str) -> Result<String, ClientError> {
        let url = self.endpoint(ACCESS_ENDPOINT)?;
        let response = self
            .traced(self.client.post(url))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&AccessRequest { subdomain })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body: AccessResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("access body: {e}")))?;
        Ok(body.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_request_wire_names() {
        let request = SaveRequest {
            content: "hello".into(),
            subdomain: DocumentRef::new("notes"),
            force_overwrite: false,
            user_key: ActorToken::new("k1"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content": "hello",
                "subdomain": "notes",
                "forceOverwrite": false,
                "userKey": "k1",
            })
        );
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(SaveOutcome::from(Ok(())), SaveOutcome::Saved);
        assert_eq!(
            SaveOutcome::from(Err(ClientError::VersionConflict { server_content: "w".into() })),
            SaveOutcome::Conflict { server_content: "w".into() }
        );
        let failed = SaveOutcome::from(Err(ClientError::ServerRejection {
            status: 500,
            body: "boom".into(),
        }));
        assert!(matches!(failed, SaveOutcome::Failed { kind: "server_rejection", .. }));
    }

    #[test]
    fn test_endpoint_joins_against_root() {
        let api = HttpPageApi::new(
            Url::parse("http://localhost:8080").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            api.endpoint(&format!("{CONTENT_ENDPOINT}/a/b")).unwrap().as_str(),
            "http://localhost:8080/get_page_content/a/b"
        );
    }
}
