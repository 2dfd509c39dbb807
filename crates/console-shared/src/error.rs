use thiserror::Error;

use crate::types::RecordId;

/// Errors surfaced by collection operations.
///
/// Every variant is terminal for the operation that produced it; nothing in
/// the console retries automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// Transport failure, including timeouts.
    #[error("Network error: {0}")]
    Network(String),

    /// `success=false` from the gateway, or a body that is not a valid envelope.
    #[error("Server rejected the request: {0}")]
    ServerRejected(String),

    /// A page past the contiguous frontier was requested.
    #[error("Page {requested} is past the loaded frontier (next loadable page is {next})")]
    GapLoad { requested: usize, next: usize },

    /// A mutation is already in flight for this record.
    #[error("Record {0} already has a mutation in flight")]
    AlreadyPending(RecordId),

    /// A batch action was invoked without targets.
    #[error("No records selected")]
    EmptySelection,

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Record {0} is not loaded")]
    UnknownRecord(RecordId),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A create or edit form failed local validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{collection} does not support the {action} action")]
    Unsupported {
        collection: &'static str,
        action: &'static str,
    },

    #[error("State lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl ConsoleError {
    /// A response body that could not be decoded as `{success, message, data}`.
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::ServerRejected(format!("malformed response envelope: {detail}"))
    }

    /// Text for the UI error channel: the gateway's own message when it sent
    /// one, a generic description otherwise.
    pub fn user_message(&self) -> String {
        match self {
            Self::ServerRejected(message) | Self::SearchFailed(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            Self::ServerRejected(_) => "The server rejected the request".to_string(),
            Self::SearchFailed(_) => "Search failed".to_string(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = ConsoleError::ServerRejected("channel not found".into());
        assert_eq!(err.user_message(), "channel not found");

        let err = ConsoleError::ServerRejected("  ".into());
        assert_eq!(err.user_message(), "The server rejected the request");
    }

    #[test]
    fn gap_load_describes_frontier() {
        let err = ConsoleError::GapLoad {
            requested: 5,
            next: 1,
        };
        assert!(err.user_message().contains("next loadable page is 1"));
    }
}
