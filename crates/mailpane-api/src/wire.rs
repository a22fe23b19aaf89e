//! Request and response bodies that differ from the core model types.

use serde::{Deserialize, Serialize};

use mailpane_core::ListEntry;

/// Body of `GET /emails`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Matching messages, newest first.
    pub emails: Vec<ListEntry>,
}

/// Error body the server sends with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub detail: String,
}
