//! Admin API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open session, as listed by `GET /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub identity: String,
    pub namespace: String,
    /// Unix timestamp (seconds) of the handshake.
    pub connected_at: i64,
}

/// Response of `DELETE /sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub id: Uuid,
    pub closed: bool,
}

/// Response of `PUT /resources/{resource_type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResourceResponse {
    /// Mirror key of the stored object (`namespace/name` or `name`).
    pub key: String,
}
