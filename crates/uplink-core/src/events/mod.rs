//! Lifecycle events and the in-process event bus.
//!
//! Every state change the engine makes is published as an [`UploadEvent`].
//! Observers subscribe per [`EventKind`] through [`EventBus`].

mod bus;

pub use bus::{EventBus, EventHandler, handler};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::RejectReason;
use crate::item::{GroupId, HandleId, ItemId};
use crate::ports::UploadResponse;

/// Single discriminated union for all upload lifecycle events.
///
/// ```typescript
/// type UploadEvent =
///   | { type: "added"; item: number }
///   | { type: "rejected"; item: number; reason: { kind: string, ... } }
///   | { type: "uploading"; group: number; items: number[] }
///   | { type: "progress"; item: number; progress: number; bytes_sent: number }
///   | { type: "success"; item: number; response?: UploadResponse }
///   | { type: "queue_empty" }
///   | ...;
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// An item entered the registry.
    Added {
        /// The new item.
        item: ItemId,
    },

    /// Validation accepted an item.
    Accepted {
        /// The accepted item.
        item: ItemId,
    },

    /// Validation rejected an item.
    Rejected {
        /// The rejected item.
        item: ItemId,
        /// Why it was rejected.
        reason: RejectReason,
    },

    /// An item was refused because the item limit was already met.
    CapacityExceeded {
        /// The refused item.
        item: ItemId,
    },

    /// The accepted count crossed up to the configured maximum.
    CapacityReached,

    /// An item is waiting for a transfer slot.
    Queued {
        /// The queued item.
        item: ItemId,
    },

    /// A transfer group started.
    Uploading {
        /// The group occupying the slot.
        group: GroupId,
        /// Members in send order.
        items: Vec<ItemId>,
    },

    /// A transport request was issued.
    Sending {
        /// Handle of the request.
        handle: HandleId,
        /// Items carried by the request.
        items: Vec<ItemId>,
    },

    /// Per-item progress.
    Progress {
        /// The item.
        item: ItemId,
        /// Percentage (0.0 - 100.0).
        progress: f64,
        /// Bytes sent so far.
        bytes_sent: u64,
    },

    /// Aggregate progress over every uploading item.
    TotalProgress {
        /// Percentage (0.0 - 100.0).
        progress: f64,
        /// Sum of bytes sent.
        bytes_sent: u64,
        /// Sum of expected bytes.
        total_bytes: u64,
    },

    /// A failed chunk is being resent.
    ChunkRetry {
        /// The chunked item.
        item: ItemId,
        /// Chunk index.
        index: usize,
        /// Retry number (1-based).
        attempt: u32,
    },

    /// An item was transferred.
    Success {
        /// The item.
        item: ItemId,
        /// Remote response.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<UploadResponse>,
    },

    /// An item was rejected or its transfer failed.
    Error {
        /// The item.
        item: ItemId,
        /// Human-readable message.
        message: String,
        /// Remote response, when the failure came with one.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<UploadResponse>,
    },

    /// An item was canceled.
    Canceled {
        /// The item.
        item: ItemId,
    },

    /// An item reached a terminal state (after success, error or canceled).
    Complete {
        /// The item.
        item: ItemId,
    },

    /// A grouped transfer succeeded.
    GroupSuccess {
        /// Members of the group.
        items: Vec<ItemId>,
        /// Remote response.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<UploadResponse>,
    },

    /// A grouped transfer failed.
    GroupError {
        /// Members of the group.
        items: Vec<ItemId>,
        /// Human-readable message.
        message: String,
        /// Remote response, when the failure came with one.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<UploadResponse>,
    },

    /// A grouped transfer was canceled.
    GroupCanceled {
        /// Members of the group.
        items: Vec<ItemId>,
    },

    /// An item was removed from the registry.
    Removed {
        /// The removed item.
        item: ItemId,
    },

    /// The registry became empty.
    Reset,

    /// Nothing is pending, queued or uploading any more.
    QueueEmpty,
}

impl UploadEvent {
    /// Create an error event.
    pub fn error(
        item: ItemId,
        message: impl Into<String>,
        response: Option<UploadResponse>,
    ) -> Self {
        Self::Error {
            item,
            message: message.into(),
            response,
        }
    }

    /// Get the kind used for subscription.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Added { .. } => EventKind::Added,
            Self::Accepted { .. } => EventKind::Accepted,
            Self::Rejected { .. } => EventKind::Rejected,
            Self::CapacityExceeded { .. } => EventKind::CapacityExceeded,
            Self::CapacityReached => EventKind::CapacityReached,
            Self::Queued { .. } => EventKind::Queued,
            Self::Uploading { .. } => EventKind::Uploading,
            Self::Sending { .. } => EventKind::Sending,
            Self::Progress { .. } => EventKind::Progress,
            Self::TotalProgress { .. } => EventKind::TotalProgress,
            Self::ChunkRetry { .. } => EventKind::ChunkRetry,
            Self::Success { .. } => EventKind::Success,
            Self::Error { .. } => EventKind::Error,
            Self::Canceled { .. } => EventKind::Canceled,
            Self::Complete { .. } => EventKind::Complete,
            Self::GroupSuccess { .. } => EventKind::GroupSuccess,
            Self::GroupError { .. } => EventKind::GroupError,
            Self::GroupCanceled { .. } => EventKind::GroupCanceled,
            Self::Removed { .. } => EventKind::Removed,
            Self::Reset => EventKind::Reset,
            Self::QueueEmpty => EventKind::QueueEmpty,
        }
    }

    /// Get the single item this event is about, if any.
    #[must_use]
    pub const fn item(&self) -> Option<ItemId> {
        match self {
            Self::Added { item }
            | Self::Accepted { item }
            | Self::Rejected { item, .. }
            | Self::CapacityExceeded { item }
            | Self::Queued { item }
            | Self::Progress { item, .. }
            | Self::ChunkRetry { item, .. }
            | Self::Success { item, .. }
            | Self::Error { item, .. }
            | Self::Canceled { item }
            | Self::Complete { item }
            | Self::Removed { item } => Some(*item),
            Self::CapacityReached
            | Self::Uploading { .. }
            | Self::Sending { .. }
            | Self::TotalProgress { .. }
            | Self::GroupSuccess { .. }
            | Self::GroupError { .. }
            | Self::GroupCanceled { .. }
            | Self::Reset
            | Self::QueueEmpty => None,
        }
    }
}

/// Event names used for subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Accepted,
    Rejected,
    CapacityExceeded,
    CapacityReached,
    Queued,
    Uploading,
    Sending,
    Progress,
    TotalProgress,
    ChunkRetry,
    Success,
    Error,
    Canceled,
    Complete,
    GroupSuccess,
    GroupError,
    GroupCanceled,
    Removed,
    Reset,
    QueueEmpty,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::CapacityExceeded => "capacity-exceeded",
            Self::CapacityReached => "capacity-reached",
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Sending => "sending",
            Self::Progress => "progress",
            Self::TotalProgress => "totalprogress",
            Self::ChunkRetry => "chunk-retry",
            Self::Success => "success",
            Self::Error => "error",
            Self::Canceled => "canceled",
            Self::Complete => "complete",
            Self::GroupSuccess => "group-success",
            Self::GroupError => "group-error",
            Self::GroupCanceled => "group-canceled",
            Self::Removed => "removed",
            Self::Reset => "reset",
            Self::QueueEmpty => "queue-empty",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
