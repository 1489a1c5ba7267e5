//! Session status events, broadcast to any number of subscribers.
//!
//! Serialised camelCase so a host UI can forward them as JSON unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Constructed, nothing running.
    Idle,
    /// Producer cadence and render host active.
    Running,
    /// Stopped by request.
    Stopped,
    /// Setup failed; `detail` on the event carries the diagnostic.
    Error,
}

/// Emitted whenever the session status changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}
