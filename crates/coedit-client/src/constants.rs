//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default server for local development.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Navigation prefix in front of every document path (`/editor/<doc>`).
pub const DEFAULT_PATH_PREFIX: &str = "/editor/";

/// Quiet period after the last edit before the trailing autosave fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Per-request timeout for save/fetch calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest accepted autosave quiet period.
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(60 * 60);

/// Largest accepted per-request timeout.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Key under which the actor token is persisted.
pub const USER_KEY_NAME: &str = "userKey";

/// Prefix of the low-quality fallback token (`user_xxxxxx`).
pub const FALLBACK_TOKEN_PREFIX: &str = "user_";

/// Number of base-36 characters after [`FALLBACK_TOKEN_PREFIX`].
pub const FALLBACK_TOKEN_LEN: usize = 6;

// ── Endpoints ────────────────────────────────────────────────────────────

pub const SAVE_ENDPOINT: &str = "/save_page_content";
pub const CONTENT_ENDPOINT: &str = "/get_page_content";
pub const CHILDREN_ENDPOINT: &str = "/getchildreneditor";
pub const ACCESS_ENDPOINT: &str = "/access_or_create_page";
pub const PUSH_ENDPOINT: &str = "/ws";

// ── Notification texts ───────────────────────────────────────────────────

pub const SAVED_NOTICE: &str = "Content saved!";
pub const SERVER_CONTENT_NOTICE: &str = "Content updated from server.";
pub const NO_CHILD_PAGES_NOTICE: &str = "No child pages.";
pub const CHILD_PAGES_ERROR_NOTICE: &str = "Error loading child pages.";
