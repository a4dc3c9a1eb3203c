//! Per-review session context, passed explicitly through every call boundary.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for one review session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned by [`SessionContext::guard`] when the session was cancelled first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session_id: SessionId,
    cancel: CancellationToken,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(session_id: SessionId, cancel: CancellationToken) -> Self {
        Self { session_id, cancel }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await `fut` unless the session is cancelled first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }
}
