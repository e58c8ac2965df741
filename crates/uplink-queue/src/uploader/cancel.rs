//! Cancellation, removal and disabling.
//!
//! Canceling an item that shares a transfer cancels the whole group: every
//! live handle of the group is aborted exactly once, every member moves to
//! CANCELED, and the freed slot is refilled before the call returns.

use tracing::{debug, info};

use uplink_core::{GroupId, ItemId, ItemStatus, UploadEvent, UploadItem, UploadResult};

use super::Uploader;
use crate::groups::GroupKind;

impl Uploader {
    /// Cancel an item. Terminal items are left alone.
    pub fn cancel(&mut self, id: ItemId) -> UploadResult<()> {
        self.registry.item(id)?;
        self.cancel_item(id);
        self.settle();
        Ok(())
    }

    /// Remove an item from the registry, canceling it first if it is uploading.
    pub fn remove(&mut self, id: ItemId) -> UploadResult<UploadItem> {
        let status = self.registry.item(id)?.status;
        let awaiting = self.awaiting_answer(id);
        if status == ItemStatus::Uploading {
            self.cancel_item(id);
        }

        let item = self.registry.remove(id)?;
        if awaiting {
            self.orphaned.insert(id);
        }
        debug!(target: "uplink.queue", item = %id, status = %item.status, "Item removed");
        self.emit(UploadEvent::Removed { item: id });
        self.after_removal(!status.is_terminal());
        self.settle();
        Ok(item)
    }

    /// Remove every item that is not uploading, or every item when
    /// `cancel_if_necessary` is set. Returns the removed ids.
    pub fn remove_all(&mut self, cancel_if_necessary: bool) -> Vec<ItemId> {
        self.hold += 1;
        let mut removed = Vec::new();
        let mut drained = false;

        for id in self.registry.ids() {
            let Some(status) = self.registry.get(id).map(|item| item.status) else {
                continue;
            };
            if status == ItemStatus::Uploading && !cancel_if_necessary {
                continue;
            }
            let awaiting = self.awaiting_answer(id);
            if status == ItemStatus::Uploading {
                self.cancel_item(id);
            }
            if self.registry.remove(id).is_ok() {
                if awaiting {
                    self.orphaned.insert(id);
                }
                self.emit(UploadEvent::Removed { item: id });
                drained |= !status.is_terminal();
                removed.push(id);
            }
        }

        if !removed.is_empty() {
            info!(target: "uplink.queue", removed = removed.len(), "Items removed");
            self.after_removal(drained);
        }
        self.hold -= 1;
        self.settle();
        removed
    }

    /// Cancel every non-terminal item and refuse new ones until [`enable`](Self::enable).
    pub fn disable(&mut self) {
        self.disabled = true;
        self.hold += 1;
        let pending: Vec<ItemId> = self
            .registry
            .iter()
            .filter(|item| !item.status.is_terminal())
            .map(|item| item.id)
            .collect();
        info!(target: "uplink.queue", canceled = pending.len(), "Uploader disabled");
        for id in pending {
            self.cancel_item(id);
        }
        self.hold -= 1;
        self.settle();
    }

    /// Accept new items again after [`disable`](Self::disable).
    pub fn enable(&mut self) {
        if self.disabled {
            info!(target: "uplink.queue", "Uploader enabled");
        }
        self.disabled = false;
    }

    fn cancel_item(&mut self, id: ItemId) {
        let Some(status) = self.registry.get(id).map(|item| item.status) else {
            return;
        };
        match status {
            ItemStatus::Added | ItemStatus::Accepted | ItemStatus::Queued => {
                self.mark_canceled(id);
            }
            // Includes groups parked on a deferred transform
            ItemStatus::Uploading => match self.groups.group_of(id) {
                Some(group) => self.cancel_group(group),
                None => {
                    self.mark_canceled(id);
                }
            },
            ItemStatus::Canceled | ItemStatus::Error | ItemStatus::Success => {
                debug!(
                    target: "uplink.queue",
                    item = %id,
                    status = %status,
                    "Cancel on finished item ignored"
                );
            }
        }
    }

    /// Abort a group's requests once and cancel all of its members.
    fn cancel_group(&mut self, group: GroupId) {
        let aborted = self.groups.abort_group(group);
        let Some(closed) = self.groups.close(group) else {
            return;
        };
        debug!(
            target: "uplink.queue",
            group = %group,
            aborted = aborted.len(),
            members = closed.members.len(),
            "Transfer group canceled"
        );

        let canceled: Vec<ItemId> = closed
            .members
            .iter()
            .copied()
            .filter(|id| self.mark_canceled(*id))
            .collect();

        if closed.kind == GroupKind::Grouped {
            self.emit(UploadEvent::GroupCanceled { items: canceled });
        }
    }

    /// Move one item to CANCELED. Returns false if it was already terminal.
    fn mark_canceled(&mut self, id: ItemId) -> bool {
        if self.registry.set_status(id, ItemStatus::Canceled).is_err() {
            return false;
        }
        if let Some(record) = self
            .registry
            .get_mut(id)
            .and_then(|item| item.transfer.as_mut())
        {
            record.handles.clear();
        }
        info!(target: "uplink.queue", item = %id, "Item canceled");
        self.emit(UploadEvent::Canceled { item: id });
        self.emit(UploadEvent::Complete { item: id });
        self.drain_pending = true;
        true
    }

    fn after_removal(&mut self, drained: bool) {
        self.recheck_capacity();
        if self.registry.is_empty() {
            self.emit(UploadEvent::Reset);
        }
        if drained {
            self.drain_pending = true;
        }
    }
}
