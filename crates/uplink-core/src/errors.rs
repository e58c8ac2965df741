//! Error types.
//!
//! Two families live here and they never mix:
//!
//! - [`UploadError`]: usage errors. Returned synchronously as `Err` from
//!   controller operations because they indicate a caller bug.
//! - [`RejectReason`]: validation outcomes. Recorded into item state and
//!   published as events; never returned as `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::item::{ItemId, ItemStatus};

/// Error type for controller operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Item id is not (or no longer) in the registry.
    #[error("Unknown item: {id}")]
    UnknownItem {
        /// The id that was not found.
        id: ItemId,
    },

    /// Enqueue on an item that is queued, in flight or terminal.
    #[error("Item {id} can't be queued because it has already been processed or was rejected")]
    AlreadyProcessed {
        /// The offending item.
        id: ItemId,
    },

    /// Enqueue on an item whose validation has not finished.
    #[error("Item {id} can't be queued because it has not been accepted yet")]
    NotAccepted {
        /// The offending item.
        id: ItemId,
    },

    /// A status change that the lifecycle graph does not allow.
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// The offending item.
        id: ItemId,
        /// Current status.
        from: ItemStatus,
        /// Requested status.
        to: ItemStatus,
    },

    /// A validation verdict arrived for an item that was not waiting for one.
    #[error("Item {id} has no pending validation")]
    NoPendingValidation {
        /// The offending item.
        id: ItemId,
    },

    /// A transformed payload arrived for an item that was not waiting for one.
    #[error("Item {id} has no pending transform")]
    NoPendingTransform {
        /// The offending item.
        id: ItemId,
    },

    /// Items were submitted after `disable()`.
    #[error("Uploader is disabled")]
    Disabled,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl UploadError {
    /// Create an unknown item error.
    #[must_use]
    pub const fn unknown_item(id: ItemId) -> Self {
        Self::UnknownItem { id }
    }

    /// Create an already processed error.
    #[must_use]
    pub const fn already_processed(id: ItemId) -> Self {
        Self::AlreadyProcessed { id }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub const fn invalid_transition(id: ItemId, from: ItemStatus, to: ItemStatus) -> Self {
        Self::InvalidTransition { id, from, to }
    }
}

/// Convenience result type for controller operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Why validation refused an item.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Payload exceeds the configured maximum size.
    #[error("File is too big ({size_mib}MiB). Max filesize: {max_mib}MiB.")]
    TooLarge {
        /// Payload size in MiB, rounded to two decimals.
        size_mib: f64,
        /// Configured limit in MiB, rounded to two decimals.
        max_mib: f64,
    },

    /// MIME type / extension not in the accept filter.
    #[error("You can't upload files of this type.")]
    InvalidType,

    /// `max_items` is zero.
    #[error("You cannot upload any more files.")]
    NoUploadsAllowed,

    /// `max_items` accepted items already exist.
    #[error("You can only upload {max} files.")]
    LimitReached {
        /// Configured maximum.
        max: usize,
    },

    /// The custom accept hook refused the item.
    #[error("{message}")]
    Custom {
        /// Message supplied by the hook.
        message: String,
    },
}

impl RejectReason {
    /// Create a custom rejection.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Capacity rejections (as opposed to per-item content rejections).
    #[must_use]
    pub const fn is_capacity(&self) -> bool {
        matches!(self, Self::NoUploadsAllowed | Self::LimitReached { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_message() {
        let reason = RejectReason::TooLarge {
            size_mib: 10.0,
            max_mib: 4.0,
        };
        assert_eq!(reason.to_string(), "File is too big (10MiB). Max filesize: 4MiB.");
    }

    #[test]
    fn test_capacity_messages_are_distinct() {
        let none = RejectReason::NoUploadsAllowed.to_string();
        let limit = RejectReason::LimitReached { max: 100 }.to_string();
        assert_eq!(none, "You cannot upload any more files.");
        assert_eq!(limit, "You can only upload 100 files.");
        assert_ne!(none, limit);
        assert!(RejectReason::NoUploadsAllowed.is_capacity());
        assert!(!RejectReason::InvalidType.is_capacity());
    }

    #[test]
    fn test_already_processed_message() {
        let err = UploadError::already_processed(ItemId::new(3));
        assert!(err.to_string().contains("already been processed or was rejected"));
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&RejectReason::custom("nope")).unwrap();
        assert!(json.contains("\"kind\":\"custom\""));
        let parsed: RejectReason = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, RejectReason::custom("nope"));
    }
}
