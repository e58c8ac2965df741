//! The upload controller.
//!
//! [`Uploader`] wires the registry, validator, scheduler, group table,
//! transport and event bus together. It is a synchronous type with no
//! internal locking; transports report back through [`Uploader::handle_signal`]
//! and the optional [`UploadRunner`](crate::runner::UploadRunner) provides
//! the async plumbing.
//!
//! # Refill
//!
//! Every public operation ends by settling: when `auto_process_queue` is on
//! the queue is processed, then a `queue_empty` event is published if a
//! terminal transition drained it. Batch operations (`add_items`,
//! `enqueue_all`, `remove_all`, `disable`) hold settling back until the whole
//! batch has been applied.

mod cancel;
mod dispatch;
mod signals;

use std::collections::HashSet;

use tracing::{debug, info};

use uplink_core::{
    AcceptDecision, ConfigLookup, EventBus, EventHandler, EventKind, ItemId, ItemSource, ItemStatus,
    RejectReason, TransferRecord, Transport, UploadError, UploadEvent, UploadHooks, UploadItem,
    UploadResult, UploaderConfig, format_file_size, validate_config,
};

use crate::groups::GroupTable;
use crate::progress::{self, TotalProgress};
use crate::registry::ItemRegistry;
use crate::scheduler::{Scheduler, SelectionFilter};
use crate::validator::{CapacityGate, Validator};

/// Upload queue controller.
pub struct Uploader {
    config: UploaderConfig,
    validator: Validator,
    capacity: CapacityGate,
    scheduler: Scheduler,
    registry: ItemRegistry,
    groups: GroupTable,
    hooks: UploadHooks,
    transport: Box<dyn Transport>,
    bus: EventBus,
    /// Nesting depth of batch operations holding back settling.
    hold: usize,
    /// A terminal transition happened since the last drain check.
    drain_pending: bool,
    /// Removed items whose deferred verdict or transform is still out.
    orphaned: HashSet<ItemId>,
    disabled: bool,
}

impl Uploader {
    /// Create an uploader. Fails on conflicting configuration.
    pub fn new(
        config: UploaderConfig,
        transport: impl Transport + 'static,
        hooks: UploadHooks,
    ) -> UploadResult<Self> {
        validate_config(&config)?;
        Ok(Self {
            validator: Validator::from_config(&config),
            capacity: CapacityGate::new(config.max_items),
            scheduler: Scheduler::new(config.concurrency_budget, config.grouped_transfer),
            registry: ItemRegistry::new(),
            groups: GroupTable::new(),
            hooks,
            transport: Box::new(transport),
            bus: EventBus::new(),
            hold: 0,
            drain_pending: false,
            orphaned: HashSet::new(),
            disabled: false,
            config,
        })
    }

    /// Create an uploader with the configuration registered for `identifier`,
    /// falling back to defaults.
    pub fn from_lookup(
        lookup: &dyn ConfigLookup,
        identifier: &str,
        transport: impl Transport + 'static,
        hooks: UploadHooks,
    ) -> UploadResult<Self> {
        let config = lookup.lookup(identifier).unwrap_or_default();
        Self::new(config, transport, hooks)
    }

    pub const fn config(&self) -> &UploaderConfig {
        &self.config
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> &mut Self {
        self.bus.on(kind, handler);
        self
    }

    /// Subscribe to every event.
    pub fn on_any(&mut self, handler: EventHandler) -> &mut Self {
        self.bus.on_any(handler);
        self
    }

    /// Drop every handler for `kind`.
    pub fn off(&mut self, kind: EventKind) -> &mut Self {
        self.bus.off(kind);
        self
    }

    /// Drop one handler instance for `kind`.
    pub fn off_handler(&mut self, kind: EventKind, handler: &EventHandler) -> &mut Self {
        self.bus.off_handler(kind, handler);
        self
    }

    /// Drop every handler.
    pub fn off_all(&mut self) -> &mut Self {
        self.bus.off_all();
        self
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Register and validate one item.
    pub fn add_item(&mut self, source: ItemSource) -> UploadResult<ItemId> {
        if self.disabled {
            return Err(UploadError::Disabled);
        }
        let id = self.intake(source);
        self.settle();
        Ok(id)
    }

    /// Register and validate several items before processing the queue once.
    pub fn add_items(
        &mut self,
        sources: impl IntoIterator<Item = ItemSource>,
    ) -> UploadResult<Vec<ItemId>> {
        if self.disabled {
            return Err(UploadError::Disabled);
        }
        self.hold += 1;
        let ids = sources.into_iter().map(|source| self.intake(source)).collect();
        self.hold -= 1;
        self.settle();
        Ok(ids)
    }

    /// Deliver a deferred accept verdict. `Err(message)` rejects.
    pub fn resolve_validation(
        &mut self,
        id: ItemId,
        verdict: Result<(), String>,
    ) -> UploadResult<()> {
        if self.orphaned.remove(&id) {
            debug!(target: "uplink.queue", item = %id, "Dropping verdict for removed item");
            return Ok(());
        }
        let item = self.registry.item_mut(id)?;
        if !item.validation_pending {
            return Err(UploadError::NoPendingValidation { id });
        }
        item.validation_pending = false;

        if item.status == ItemStatus::Added {
            match verdict {
                Ok(()) => self.admit(id),
                Err(message) => self.reject(id, RejectReason::custom(message)),
            }
        } else {
            debug!(
                target: "uplink.queue",
                item = %id,
                status = %item.status,
                "Dropping verdict for item that moved on"
            );
        }
        self.settle();
        Ok(())
    }

    /// Move an accepted item into the queue.
    pub fn enqueue(&mut self, id: ItemId) -> UploadResult<()> {
        self.enqueue_checked(id)?;
        self.settle();
        Ok(())
    }

    /// Enqueue several items before processing the queue once. Stops at the
    /// first failure; items enqueued before it stay queued.
    pub fn enqueue_all(&mut self, ids: &[ItemId]) -> UploadResult<()> {
        self.hold += 1;
        let result = ids.iter().try_for_each(|id| self.enqueue_checked(*id));
        self.hold -= 1;
        self.settle();
        result
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Start as many transfer groups as the budget allows. Returns how many
    /// groups were started.
    pub fn process_queue(&mut self) -> usize {
        self.process_queue_with(&SelectionFilter::default())
    }

    /// [`process_queue`](Self::process_queue) with extra selection constraints.
    pub fn process_queue_with(&mut self, filter: &SelectionFilter) -> usize {
        let started = self.run_queue(filter);
        self.check_drained();
        started
    }

    /// Re-evaluate the capacity threshold. Returns whether `capacity_reached`
    /// was published.
    pub fn recheck_capacity(&mut self) -> bool {
        let count = self.registry.accepted_count();
        let crossed = self.capacity.recheck(count);
        if crossed {
            info!(target: "uplink.queue", accepted = count, "Item limit reached");
            self.emit(UploadEvent::CapacityReached);
        }
        crossed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn item(&self, id: ItemId) -> Option<&UploadItem> {
        self.registry.get(id)
    }

    pub const fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    /// Ids with the given status, in insertion order.
    pub fn query(&self, status: ItemStatus) -> Vec<ItemId> {
        self.registry.query(status)
    }

    pub fn accepted_items(&self) -> Vec<ItemId> {
        self.registry.accepted()
    }

    pub fn rejected_items(&self) -> Vec<ItemId> {
        self.registry.rejected()
    }

    pub fn added_items(&self) -> Vec<ItemId> {
        self.registry.added()
    }

    pub fn queued_items(&self) -> Vec<ItemId> {
        self.registry.queued()
    }

    pub fn uploading_items(&self) -> Vec<ItemId> {
        self.registry.uploading()
    }

    /// Queued or uploading items.
    pub fn active_items(&self) -> Vec<ItemId> {
        self.registry.active()
    }

    /// Transfer groups occupying a slot.
    pub fn active_groups(&self) -> usize {
        self.groups.active_count()
    }

    /// Requests neither aborted nor finished.
    pub fn live_handles(&self) -> usize {
        self.groups.live_handles()
    }

    pub fn total_progress(&self) -> TotalProgress {
        progress::aggregate(self.registry.iter())
    }

    /// Human-readable size using the configured unit base.
    pub fn format_size(&self, bytes: u64) -> String {
        format_file_size(bytes, self.config.file_size_base)
    }

    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&self, event: UploadEvent) {
        self.bus.emit(&event);
    }

    fn intake(&mut self, source: ItemSource) -> ItemId {
        let id = self.registry.add(source);
        debug!(target: "uplink.queue", item = %id, "Item added");
        self.emit(UploadEvent::Added { item: id });
        self.validate(id);
        id
    }

    /// Size, type, custom hook; then capacity once the hook has answered.
    fn validate(&mut self, id: ItemId) {
        let Some(item) = self.registry.get(id) else {
            return;
        };
        if let Err(reason) = self.validator.check_content(item) {
            self.reject(id, reason);
            return;
        }

        let decision = self
            .hooks
            .accept
            .as_ref()
            .map_or(AcceptDecision::Accept, |hook| hook.check(item));

        match decision {
            AcceptDecision::Accept => self.admit(id),
            AcceptDecision::Reject(message) => self.reject(id, RejectReason::custom(message)),
            AcceptDecision::Deferred => {
                if let Some(item) = self.registry.get_mut(id) {
                    item.validation_pending = true;
                }
                debug!(target: "uplink.queue", item = %id, "Validation deferred");
            }
        }
    }

    fn admit(&mut self, id: ItemId) {
        match self.capacity.admit(self.registry.accepted_count()) {
            Ok(()) => self.accept(id),
            Err(reason) => {
                self.emit(UploadEvent::CapacityExceeded { item: id });
                self.reject(id, reason);
            }
        }
    }

    fn accept(&mut self, id: ItemId) {
        if self.registry.set_status(id, ItemStatus::Accepted).is_err() {
            return;
        }
        if let Some(item) = self.registry.get_mut(id) {
            item.accepted = true;
        }
        debug!(target: "uplink.queue", item = %id, "Item accepted");
        self.emit(UploadEvent::Accepted { item: id });
        self.recheck_capacity();

        if self.config.auto_enqueue {
            self.enqueue_accepted(id);
        }
    }

    fn reject(&mut self, id: ItemId, reason: RejectReason) {
        if self.registry.set_status(id, ItemStatus::Error).is_err() {
            return;
        }
        let message = reason.to_string();
        if let Some(item) = self.registry.get_mut(id) {
            item.error = Some(message.clone());
        }
        info!(target: "uplink.queue", item = %id, reason = %message, "Item rejected");
        self.emit(UploadEvent::Rejected { item: id, reason });
        self.emit(UploadEvent::error(id, message, None));
        self.emit(UploadEvent::Complete { item: id });
        self.drain_pending = true;
    }

    fn enqueue_checked(&mut self, id: ItemId) -> UploadResult<()> {
        match self.registry.item(id)?.status {
            ItemStatus::Accepted => {
                self.enqueue_accepted(id);
                Ok(())
            }
            ItemStatus::Added => Err(UploadError::NotAccepted { id }),
            ItemStatus::Queued
            | ItemStatus::Uploading
            | ItemStatus::Canceled
            | ItemStatus::Error
            | ItemStatus::Success => Err(UploadError::already_processed(id)),
        }
    }

    fn enqueue_accepted(&mut self, id: ItemId) {
        if self.registry.set_status(id, ItemStatus::Queued).is_err() {
            return;
        }
        if let Some(item) = self.registry.get_mut(id) {
            if item.transfer.is_none() {
                item.transfer = Some(TransferRecord::new(item.name.clone()));
            }
        }
        debug!(target: "uplink.queue", item = %id, "Item queued");
        self.emit(UploadEvent::Queued { item: id });
    }

    fn run_queue(&mut self, filter: &SelectionFilter) -> usize {
        let mut started = 0;
        loop {
            let plans = self
                .scheduler
                .plan(&self.registry, self.groups.active_count(), filter);
            if plans.is_empty() {
                break;
            }
            let expected = self.groups.active_count() + plans.len();
            for plan in &plans {
                self.start_group(plan);
                started += 1;
            }
            // Only replan when a group ended while starting
            if self.groups.active_count() >= expected {
                break;
            }
        }
        started
    }

    fn settle(&mut self) {
        if self.hold > 0 {
            return;
        }
        if self.config.auto_process_queue {
            self.run_queue(&SelectionFilter::default());
        }
        self.check_drained();
    }

    fn check_drained(&mut self) {
        if !std::mem::take(&mut self.drain_pending) {
            return;
        }
        let busy = self.registry.iter().any(|item| {
            matches!(
                item.status,
                ItemStatus::Added
                    | ItemStatus::Accepted
                    | ItemStatus::Queued
                    | ItemStatus::Uploading
            )
        });
        if !busy {
            debug!(target: "uplink.queue", "Queue drained");
            self.emit(UploadEvent::QueueEmpty);
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("items", &self.registry.len())
            .field("active_groups", &self.groups.active_count())
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}
