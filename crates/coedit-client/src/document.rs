//! Document references and child-page listings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the edited document (the "subdomain"), e.g. `notes/today`.
///
/// Derived from the navigation path once per page view and never changed.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    /// Derive from a navigation path: strip `prefix` from the front (if present)
    /// and one trailing slash.
    ///
    /// `/editor/notes/today/` with prefix `/editor/` → `notes/today`.
    pub fn from_path(path: &str, prefix: &str) -> Self {
        let rest = path.strip_prefix(prefix).unwrap_or(path);
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        Self(rest.to_string())
    }

    /// Use `name` as-is (already a document reference).
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentRef({})", self.0)
    }
}

/// One entry of `/getchildreneditor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildPage {
    pub file_name: String,
    pub full_path: String,
}

/// What the child-page view should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildListing {
    Pages(Vec<ChildPage>),
    /// The page has no children.
    Empty,
    /// The listing could not be loaded.
    Unavailable,
}

impl ChildListing {
    pub fn from_pages(pages: Vec<ChildPage>) -> Self {
        if pages.is_empty() { ChildListing::Empty } else { ChildListing::Pages(pages) }
    }
}
