//! Error types for cfsync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IP range feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Failed to query security group {group_id}: {message}")]
    BackendQuery { group_id: String, message: String },

    #[error("Failed to modify security group {group_id}: {message}")]
    BackendMutation { group_id: String, message: String },

    #[error("Notification failed: {0}")]
    Notification(String),
}

impl SyncError {
    /// Whether backend state may have changed before this error was raised
    pub fn may_have_mutated(&self) -> bool {
        matches!(self, SyncError::BackendMutation { .. })
    }
}
