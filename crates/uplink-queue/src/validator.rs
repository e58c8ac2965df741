//! Candidate validation and the capacity gate.
//!
//! Content checks run in a fixed order: size, then type. The custom accept
//! hook and the capacity check are sequenced by the uploader because the
//! hook may defer its verdict.

use uplink_core::{AcceptFilter, RejectReason, UploadItem, UploaderConfig, bytes_to_mib};

/// Size and type checks.
#[derive(Debug, Clone)]
pub struct Validator {
    max_item_size: u64,
    accept: AcceptFilter,
}

impl Validator {
    /// Build from configuration.
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            max_item_size: config.max_item_size,
            accept: config.accept(),
        }
    }

    /// Check size, then type.
    pub fn check_content(&self, item: &UploadItem) -> Result<(), RejectReason> {
        let size = item.size();
        if size > self.max_item_size {
            return Err(RejectReason::TooLarge {
                size_mib: bytes_to_mib(size),
                max_mib: bytes_to_mib(self.max_item_size),
            });
        }

        if !self.accept.matches(&item.name, &item.mime_type) {
            return Err(RejectReason::InvalidType);
        }

        Ok(())
    }
}

/// Tracks the accepted-items limit and the capacity-reached edge.
#[derive(Debug, Clone)]
pub struct CapacityGate {
    max_items: Option<usize>,
    reached: bool,
}

impl CapacityGate {
    /// Create a gate for an optional limit.
    pub const fn new(max_items: Option<usize>) -> Self {
        Self {
            max_items,
            reached: false,
        }
    }

    /// Whether one more item may be accepted given the current count.
    pub fn admit(&self, accepted_count: usize) -> Result<(), RejectReason> {
        match self.max_items {
            Some(0) => Err(RejectReason::NoUploadsAllowed),
            Some(max) if accepted_count >= max => Err(RejectReason::LimitReached { max }),
            _ => Ok(()),
        }
    }

    /// Update the threshold state. Returns `true` only when the count has
    /// just risen to (or past) the limit.
    pub fn recheck(&mut self, accepted_count: usize) -> bool {
        let at_limit = self
            .max_items
            .is_some_and(|max| max > 0 && accepted_count >= max);
        let crossed = at_limit && !self.reached;
        self.reached = at_limit;
        crossed
    }

    /// Current threshold state.
    pub const fn is_reached(&self) -> bool {
        self.reached
    }
}
