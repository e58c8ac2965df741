//! Item registry.
//!
//! Owns every item and its status. This is a pure state container with no
//! I/O or events; the uploader is responsible for publishing changes.
//!
//! # Ordering
//!
//! Items are stored in insertion order and every query preserves it. Removal
//! shifts later items down instead of swapping, so order survives removals.

use indexmap::IndexMap;

use uplink_core::{ItemId, ItemSource, ItemStatus, UploadError, UploadItem, UploadResult};

/// Canonical list of items keyed by id.
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: IndexMap<ItemId, UploadItem>,
    next_id: u64,
}

impl ItemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new item in the ADDED state and return its id.
    pub fn add(&mut self, source: ItemSource) -> ItemId {
        self.next_id += 1;
        let id = ItemId::new(self.next_id);
        self.items.insert(id, UploadItem::new(id, source));
        id
    }

    /// Remove an item, returning it.
    pub fn remove(&mut self, id: ItemId) -> UploadResult<UploadItem> {
        self.items
            .shift_remove(&id)
            .ok_or_else(|| UploadError::unknown_item(id))
    }

    /// Look up an item.
    pub fn get(&self, id: ItemId) -> Option<&UploadItem> {
        self.items.get(&id)
    }

    /// Look up an item mutably.
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut UploadItem> {
        self.items.get_mut(&id)
    }

    /// Look up an item, failing on unknown ids.
    pub fn item(&self, id: ItemId) -> UploadResult<&UploadItem> {
        self.get(id).ok_or_else(|| UploadError::unknown_item(id))
    }

    /// Look up an item mutably, failing on unknown ids.
    pub fn item_mut(&mut self, id: ItemId) -> UploadResult<&mut UploadItem> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| UploadError::unknown_item(id))
    }

    /// Move an item along the status graph. Returns the previous status.
    pub fn set_status(&mut self, id: ItemId, status: ItemStatus) -> UploadResult<ItemStatus> {
        let item = self.item_mut(id)?;
        let previous = item.status;
        if !previous.can_transition_to(status) {
            return Err(UploadError::invalid_transition(id, previous, status));
        }
        item.status = status;
        Ok(previous)
    }

    /// Ids with the given status, in insertion order.
    pub fn query(&self, status: ItemStatus) -> Vec<ItemId> {
        self.filter(|item| item.status == status)
    }

    /// Items that passed validation (regardless of current status).
    pub fn accepted(&self) -> Vec<ItemId> {
        self.filter(|item| item.accepted)
    }

    /// Items that failed validation.
    pub fn rejected(&self) -> Vec<ItemId> {
        self.filter(UploadItem::is_rejected)
    }

    /// Items still in the ADDED state.
    pub fn added(&self) -> Vec<ItemId> {
        self.query(ItemStatus::Added)
    }

    /// Items waiting for a slot.
    pub fn queued(&self) -> Vec<ItemId> {
        self.query(ItemStatus::Queued)
    }

    /// Items in flight.
    pub fn uploading(&self) -> Vec<ItemId> {
        self.query(ItemStatus::Uploading)
    }

    /// Items that are queued or uploading.
    pub fn active(&self) -> Vec<ItemId> {
        self.filter(|item| item.status.is_active())
    }

    /// Number of items that passed validation.
    pub fn accepted_count(&self) -> usize {
        self.items.values().filter(|item| item.accepted).count()
    }

    /// Count of items with the given status.
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.values().filter(|item| item.status == status).count()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }

    /// Iterate items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &UploadItem> {
        self.items.values()
    }

    fn filter(&self, pred: impl Fn(&UploadItem) -> bool) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|item| pred(item))
            .map(|item| item.id)
            .collect()
    }
}
