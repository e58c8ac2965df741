//! Slot accounting and batch selection.
//!
//! Pure functions over the registry: the uploader asks for plans, then
//! starts them. Each plan consumes one slot no matter how many items it
//! carries.

use std::fmt;
use std::sync::Arc;

use uplink_core::{ItemId, ItemStatus, UploadItem};

use crate::groups::TransferPlan;
use crate::registry::ItemRegistry;

/// Extra constraints on a `process_queue` call.
#[derive(Clone, Default)]
pub struct SelectionFilter {
    /// Do nothing unless at least this many slots are free.
    pub min_free_slots: usize,
    /// Only queued items matching this predicate are selected.
    pub predicate: Option<Arc<dyn Fn(&UploadItem) -> bool + Send + Sync>>,
}

impl SelectionFilter {
    /// Require a number of free slots.
    #[must_use]
    pub const fn min_free_slots(mut self, slots: usize) -> Self {
        self.min_free_slots = slots;
        self
    }

    /// Restrict selection with a predicate.
    #[must_use]
    pub fn only(mut self, predicate: impl Fn(&UploadItem) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    fn admits(&self, item: &UploadItem) -> bool {
        self.predicate.as_ref().is_none_or(|pred| pred(item))
    }
}

impl fmt::Debug for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionFilter")
            .field("min_free_slots", &self.min_free_slots)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Concurrency budget and batching policy.
#[derive(Clone, Copy, Debug)]
pub struct Scheduler {
    budget: usize,
    grouped: bool,
}

impl Scheduler {
    pub const fn new(budget: usize, grouped: bool) -> Self {
        Self { budget, grouped }
    }

    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Slots not taken by active groups.
    pub const fn free_slots(&self, active_groups: usize) -> usize {
        self.budget.saturating_sub(active_groups)
    }

    /// Plans to start now, in registry insertion order.
    ///
    /// Grouped mode bundles up to `free` queued items into a single plan.
    pub fn plan(
        &self,
        registry: &ItemRegistry,
        active_groups: usize,
        filter: &SelectionFilter,
    ) -> Vec<TransferPlan> {
        let free = self.free_slots(active_groups);
        if free == 0 || free < filter.min_free_slots {
            return Vec::new();
        }

        let candidates: Vec<ItemId> = registry
            .iter()
            .filter(|item| item.status == ItemStatus::Queued && filter.admits(item))
            .map(|item| item.id)
            .collect();

        TransferPlan::for_batch(&candidates[..candidates.len().min(free)], self.grouped)
    }
}
