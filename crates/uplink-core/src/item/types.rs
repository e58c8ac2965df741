//! Item identity, lifecycle status, and the item record itself.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transfer::TransferRecord;

/// Opaque identifier for an item in the registry.
///
/// Minted by the registry when an item is added. Two items with identical
/// names and payloads still have distinct ids; identity is never derived
/// from content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Lifecycle status of an item.
///
/// ```text
/// Added ──► Accepted ──► Queued ──► Uploading ──► Success
///   │          │           │            │
///   ├──► Error │           │            ├──► Error
///   └──────────┴───────────┴────────────┴──► Canceled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Registered, validation not finished yet.
    Added,
    /// Passed validation, waiting to be enqueued.
    Accepted,
    /// Waiting for a free transfer slot.
    Queued,
    /// Part of an in-flight transfer group.
    Uploading,
    /// Canceled by the caller.
    Canceled,
    /// Rejected by validation or failed in transport.
    Error,
    /// Transferred successfully.
    Success,
}

impl ItemStatus {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Accepted => "accepted",
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Canceled => "canceled",
            Self::Error => "error",
            Self::Success => "success",
        }
    }

    /// Terminal states are never left once entered.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Error | Self::Success)
    }

    /// Queued or uploading.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Uploading)
    }

    /// Check whether `next` is reachable from this status in one step.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Added => matches!(next, Self::Accepted | Self::Error | Self::Canceled),
            Self::Accepted => matches!(next, Self::Queued | Self::Canceled),
            Self::Queued => matches!(next, Self::Uploading | Self::Canceled),
            Self::Uploading => matches!(next, Self::Success | Self::Error | Self::Canceled),
            Self::Canceled | Self::Error | Self::Success => false,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller submits when adding an item.
#[derive(Clone, Debug)]
pub struct ItemSource {
    /// Original filename.
    pub name: String,
    /// Declared MIME type (may be empty).
    pub mime_type: String,
    /// Payload bytes.
    pub payload: Bytes,
}

impl ItemSource {
    /// Create a new source.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }
}

/// One user-selected payload tracked by the registry.
#[derive(Clone, Debug)]
pub struct UploadItem {
    /// Registry identity.
    pub id: ItemId,
    /// Original filename.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Current payload (replaced by the transform hook, if any).
    pub payload: Bytes,
    /// Current lifecycle status.
    pub status: ItemStatus,
    /// Set once validation accepts the item; stays set afterwards.
    pub accepted: bool,
    /// Human-readable reason for the ERROR status.
    pub error: Option<String>,
    /// Transfer bookkeeping, created when the item is first queued.
    pub transfer: Option<TransferRecord>,
    /// When the item was added.
    pub added_at: DateTime<Utc>,
    /// A custom accept hook deferred its verdict.
    pub validation_pending: bool,
}

impl UploadItem {
    /// Create a new item in the ADDED state.
    pub fn new(id: ItemId, source: ItemSource) -> Self {
        Self {
            id,
            name: source.name,
            mime_type: source.mime_type,
            payload: source.payload,
            status: ItemStatus::Added,
            accepted: false,
            error: None,
            transfer: None,
            added_at: Utc::now(),
            validation_pending: false,
        }
    }

    /// Byte length of the current payload.
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Rejected items are in ERROR without ever having been accepted.
    pub const fn is_rejected(&self) -> bool {
        !self.accepted && matches!(self.status, ItemStatus::Error)
    }
}
