//! Unified error handling for chat-relay.
//!
//! User-facing failures are reported at the point of the attempted operation
//! and never cross from async workers back into the delivery path.

use thiserror::Error;

/// Errors raised by channel and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid channel name: {0}")]
    InvalidName(String),

    #[error("no such channel: {0}")]
    NotFound(String),

    #[error("{member} is not a member of {channel}")]
    NotMember { member: String, channel: String },

    #[error("{member} is already a member of {channel}")]
    AlreadyMember { member: String, channel: String },

    #[error("{0} is already banned")]
    AlreadyBanned(String),

    #[error("{0} is not banned")]
    NotBanned(String),

    #[error("{0} is already muted")]
    AlreadyMuted(String),

    #[error("{0} is not muted")]
    NotMuted(String),

    #[error("missing permission: {0}")]
    PermissionDenied(String),

    #[error("the global channel cannot be left or removed")]
    GlobalChannel,

    #[error("force-join channels cannot be left")]
    ForceJoinChannel,

    /// An event hook vetoed the operation. Treated as a silent no-op by
    /// callers, not surfaced to the actor as a failure.
    #[error("cancelled by event hook")]
    Cancelled,

    #[error("store failure: {0}")]
    Store(String),
}

impl ChannelError {
    /// Static code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidName(_) => "invalid_name",
            Self::NotFound(_) => "not_found",
            Self::NotMember { .. } => "not_member",
            Self::AlreadyMember { .. } => "already_member",
            Self::AlreadyBanned(_) => "already_banned",
            Self::NotBanned(_) => "not_banned",
            Self::AlreadyMuted(_) => "already_muted",
            Self::NotMuted(_) => "not_muted",
            Self::PermissionDenied(_) => "permission_denied",
            Self::GlobalChannel => "global_channel",
            Self::ForceJoinChannel => "force_join_channel",
            Self::Cancelled => "cancelled",
            Self::Store(_) => "store",
        }
    }

    /// Whether this error represents a hook veto rather than a real failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors raised by chat log retrieval. Write-side failures never surface
/// here; they are traced and swallowed inside the writer task.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed log date: {0}")]
    BadDate(String),
}

/// Persistence collaborator errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            ChannelError::AlreadyExists("town".into()).error_code(),
            "already_exists"
        );
        assert_eq!(ChannelError::GlobalChannel.error_code(), "global_channel");
        assert_eq!(ChannelError::Cancelled.error_code(), "cancelled");
    }

    #[test]
    fn cancellation_is_not_a_failure() {
        assert!(ChannelError::Cancelled.is_cancellation());
        assert!(!ChannelError::GlobalChannel.is_cancellation());
    }
}
