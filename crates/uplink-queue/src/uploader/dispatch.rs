//! Starting transfer groups: transforms, request building and chunk pumping.

use std::collections::BTreeSet;

use bytes::Bytes;
use tracing::{debug, warn};

use uplink_core::{
    ChunkParams, ChunkStatus, GroupId, HandleId, ItemId, ItemStatus, RequestOptions, RequestPart,
    RequestTarget, TransferRecord, TransferRequest, TransformDecision, TransportError, UploadError,
    UploadEvent, UploadItem, UploadResult,
};

use super::Uploader;
use crate::groups::{GroupKind, GroupPhase, SharedHandle, TransferPlan, chunk_bytes, plan_chunks};

impl Uploader {
    /// Deliver a deferred payload transform. The item's group is dispatched
    /// once every member has its final payload.
    pub fn complete_transform(&mut self, id: ItemId, payload: Bytes) -> UploadResult<()> {
        if self.orphaned.remove(&id) {
            debug!(target: "uplink.queue", item = %id, "Dropping transform for removed item");
            return Ok(());
        }
        let Some(group) = self.transform_group(id) else {
            // Canceled while the transform was running
            if self.registry.item(id)?.status.is_terminal() {
                return Ok(());
            }
            return Err(UploadError::NoPendingTransform { id });
        };

        self.registry.item_mut(id)?.payload = payload;

        let ready = self.groups.get_mut(group).is_some_and(|g| {
            let GroupPhase::AwaitingTransform(pending) = &mut g.phase else {
                return false;
            };
            pending.remove(&id);
            if pending.is_empty() {
                g.phase = GroupPhase::InFlight;
                true
            } else {
                false
            }
        });

        if ready {
            self.dispatch_group(group);
        }
        self.settle();
        Ok(())
    }

    /// Group parked on `id`'s transform, if any.
    fn transform_group(&self, id: ItemId) -> Option<GroupId> {
        self.groups.group_of(id).filter(|gid| {
            self.groups.get(*gid).is_some_and(|g| {
                matches!(&g.phase, GroupPhase::AwaitingTransform(pending) if pending.contains(&id))
            })
        })
    }

    /// Whether a verdict or transform for `id` is still expected.
    pub(super) fn awaiting_answer(&self, id: ItemId) -> bool {
        self.registry.get(id).is_some_and(|item| item.validation_pending)
            || self.transform_group(id).is_some()
    }

    pub(super) fn start_group(&mut self, plan: &TransferPlan) {
        let group = self.groups.open(plan);
        let members = plan.members();

        for id in &members {
            if let Err(e) = self.registry.set_status(*id, ItemStatus::Uploading) {
                warn!(
                    target: "uplink.queue",
                    item = %id,
                    error = %e,
                    "Selected item could not start"
                );
                continue;
            }
            let Some(item) = self.registry.get(*id) else {
                continue;
            };
            let filename = self.hooks.filename_for(item);
            if let Some(item) = self.registry.get_mut(*id) {
                let record = item
                    .transfer
                    .get_or_insert_with(|| TransferRecord::new(filename.clone()));
                record.filename = filename;
            }
        }

        debug!(
            target: "uplink.queue",
            group = %group,
            items = members.len(),
            "Starting transfer group"
        );
        self.emit(UploadEvent::Uploading {
            group,
            items: members.clone(),
        });

        let pending = self.run_transforms(&members);
        if pending.is_empty() {
            self.dispatch_group(group);
        } else if let Some(g) = self.groups.get_mut(group) {
            debug!(
                target: "uplink.queue",
                group = %group,
                pending = pending.len(),
                "Waiting for payload transforms"
            );
            g.phase = GroupPhase::AwaitingTransform(pending);
        }
    }

    fn run_transforms(&mut self, members: &[ItemId]) -> BTreeSet<ItemId> {
        let mut pending = BTreeSet::new();
        let Some(hook) = self.hooks.transform.clone() else {
            return pending;
        };

        for id in members {
            let Some(item) = self.registry.get(*id) else {
                continue;
            };
            match hook.transform(item) {
                TransformDecision::Unchanged => {}
                TransformDecision::Ready(payload) => {
                    if let Some(item) = self.registry.get_mut(*id) {
                        item.payload = payload;
                    }
                }
                TransformDecision::Deferred => {
                    pending.insert(*id);
                }
            }
        }
        pending
    }

    fn dispatch_group(&mut self, group: GroupId) {
        let Some(g) = self.groups.get(group) else {
            return;
        };
        let members = g.members.clone();

        if g.kind == GroupKind::Grouped {
            self.send_whole(group, &members, true);
            return;
        }

        let Some(&id) = members.first() else {
            return;
        };
        let size = self.registry.get(id).map_or(0, |item| item.size());
        if self.config.should_chunk(size) {
            self.start_chunked(group, id, size);
        } else {
            self.send_whole(group, &members, false);
        }
    }

    fn send_whole(&mut self, group: GroupId, members: &[ItemId], grouped: bool) {
        let parts: Vec<RequestPart> = members
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let item = self.registry.get(*id)?;
                Some(RequestPart {
                    item: *id,
                    field_name: self
                        .hooks
                        .param_naming
                        .field_name(&self.config.param_name, index, grouped),
                    filename: item
                        .transfer
                        .as_ref()
                        .map_or_else(|| item.name.clone(), |t| t.filename.clone()),
                    mime_type: item.mime_type.clone(),
                    data: item.payload.clone(),
                })
            })
            .collect();

        if let Err(e) = self.send(group, members.to_vec(), parts, None) {
            warn!(target: "uplink.queue", group = %group, error = %e, "Transport refused request");
            self.fail_group(group, e.user_message(), None);
        }
    }

    fn start_chunked(&mut self, group: GroupId, id: ItemId, size: u64) {
        if let Some(g) = self.groups.get_mut(group) {
            g.kind = GroupKind::Chunked;
        }
        let chunks = plan_chunks(size, self.config.chunk_size_bytes);
        debug!(target: "uplink.queue", item = %id, chunks = chunks.len(), "Chunking payload");
        if let Some(record) = self
            .registry
            .get_mut(id)
            .and_then(|item| item.transfer.as_mut())
        {
            record.chunked = true;
            record.chunks = chunks;
        }
        self.pump_chunks(group, id);
    }

    /// Send pending chunks until the parallelism cap is reached.
    pub(super) fn pump_chunks(&mut self, group: GroupId, id: ItemId) {
        let parallelism = self.config.chunk_parallelism();
        loop {
            let Some(item) = self.registry.get(id) else {
                return;
            };
            let Some(record) = item.transfer.as_ref() else {
                return;
            };
            if record.chunks_in_flight() >= parallelism {
                return;
            }
            let Some(chunk) = record
                .chunks
                .iter()
                .find(|c| c.status == ChunkStatus::Pending)
            else {
                return;
            };

            let params = ChunkParams {
                uuid: record.uuid,
                index: chunk.index,
                total_chunk_count: record.chunks.len(),
                chunk_size: self.config.chunk_size_bytes,
                byte_offset: chunk.offset,
                total_file_size: item.size(),
            };
            let part = RequestPart {
                item: id,
                field_name: self
                    .hooks
                    .param_naming
                    .field_name(&self.config.param_name, 0, false),
                filename: record.filename.clone(),
                mime_type: item.mime_type.clone(),
                data: chunk_bytes(&item.payload, chunk),
            };
            let index = chunk.index;

            match self.send(group, vec![id], vec![part], Some((index, params))) {
                Ok(handle) => {
                    if let Some(chunk) = self
                        .registry
                        .get_mut(id)
                        .and_then(|item| item.transfer.as_mut())
                        .and_then(|record| record.chunks.get_mut(index))
                    {
                        chunk.status = ChunkStatus::Sent;
                        chunk.handle = Some(handle);
                    }
                }
                Err(e) => {
                    warn!(
                        target: "uplink.queue",
                        item = %id,
                        chunk = index,
                        error = %e,
                        "Transport refused chunk"
                    );
                    self.fail_group(group, e.user_message(), None);
                    return;
                }
            }
        }
    }

    fn send(
        &mut self,
        group: GroupId,
        members: Vec<ItemId>,
        parts: Vec<RequestPart>,
        chunk: Option<(usize, ChunkParams)>,
    ) -> Result<HandleId, TransportError> {
        let handle = self.groups.next_handle_id();
        let request = TransferRequest {
            handle,
            parts,
            options: self.request_options(&members),
            chunk: chunk.as_ref().map(|(_, params)| params.clone()),
        };
        let inner = self.transport.send(request)?;

        let chunk_ref = chunk.and_then(|(index, _)| members.first().map(|id| (*id, index)));
        self.groups
            .attach(SharedHandle::new(handle, group, members.clone(), chunk_ref, inner));
        for id in &members {
            if let Some(record) = self
                .registry
                .get_mut(*id)
                .and_then(|item| item.transfer.as_mut())
            {
                record.handles.insert(handle);
            }
        }

        debug!(target: "uplink.queue", handle = %handle, group = %group, "Request sent");
        self.emit(UploadEvent::Sending {
            handle,
            items: members,
        });
        Ok(handle)
    }

    fn request_options(&self, members: &[ItemId]) -> RequestOptions {
        let configured = RequestTarget {
            url: self.config.url.clone(),
            method: self.config.method.clone(),
        };
        let items: Vec<&UploadItem> = members
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .collect();
        let RequestTarget { url, method } = self.hooks.target_for(&items, configured);
        RequestOptions {
            url,
            method,
            timeout: self.config.timeout(),
            headers: self.config.headers.clone(),
            binary_body: self.config.binary_body,
        }
    }
}
