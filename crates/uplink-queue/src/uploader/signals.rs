//! Applying transport signals: progress, completion, failure and chunk retries.

use tracing::{debug, info, warn};

use uplink_core::{
    ChunkStatus, GroupId, HandleId, ItemId, ItemStatus, TransportSignal, UploadEvent,
    UploadResponse,
};

use super::Uploader;
use crate::groups::GroupKind;
use crate::progress::{
    aggregate, record_chunk_acked, record_chunk_progress, record_complete, record_request_progress,
};

/// Context of the handle a signal was reported for.
struct Origin {
    handle: HandleId,
    group: GroupId,
    members: Vec<ItemId>,
    chunk: Option<(ItemId, usize)>,
}

impl Uploader {
    /// Apply a signal reported for `handle`.
    ///
    /// Signals for handles that were aborted, already finished or belong to a
    /// group that no longer exists are ignored; the return value says whether
    /// the signal was applied.
    pub fn handle_signal(&mut self, handle: HandleId, signal: TransportSignal) -> bool {
        let origin = match self.groups.handle(handle) {
            Some(shared) if shared.is_live() => Origin {
                handle,
                group: shared.group,
                members: shared.members.clone(),
                chunk: shared.chunk,
            },
            _ => {
                debug!(
                    target: "uplink.queue",
                    handle = %handle,
                    "Ignoring signal for retired handle"
                );
                return false;
            }
        };

        match signal {
            TransportSignal::Progress {
                bytes_sent,
                total_bytes,
            } => self.on_progress(&origin, bytes_sent, total_bytes),
            TransportSignal::Completed(response) if response.is_success() => {
                self.on_completed(&origin, response);
            }
            TransportSignal::Completed(response) => {
                let message = response.error_message().map_or_else(
                    || format!("Server responded with {} code.", response.status),
                    str::to_string,
                );
                self.on_failed(&origin, message, Some(response));
            }
            TransportSignal::Failed { message, response } => {
                let message = response
                    .as_ref()
                    .and_then(UploadResponse::error_message)
                    .map_or(message, str::to_string);
                self.on_failed(&origin, message, response);
            }
        }

        self.settle();
        true
    }

    fn on_progress(&mut self, origin: &Origin, bytes_sent: u64, total_bytes: u64) {
        let mut updates = Vec::with_capacity(origin.members.len());
        for id in &origin.members {
            let Some(item) = self.registry.get_mut(*id) else {
                continue;
            };
            if item.status != ItemStatus::Uploading {
                continue;
            }
            let size = item.size();
            let Some(record) = item.transfer.as_mut() else {
                continue;
            };
            match origin.chunk {
                Some((_, index)) => record_chunk_progress(record, size, index, bytes_sent),
                None => record_request_progress(record, bytes_sent, total_bytes),
            }
            updates.push(UploadEvent::Progress {
                item: *id,
                progress: record.progress,
                bytes_sent: record.bytes_sent,
            });
        }

        for event in updates {
            self.emit(event);
        }
        self.emit_total_progress();
    }

    fn on_completed(&mut self, origin: &Origin, response: UploadResponse) {
        self.retire_handle(origin);

        let Some((id, index)) = origin.chunk else {
            self.succeed_group(origin.group, Some(response));
            return;
        };

        let Some(item) = self.registry.get_mut(id) else {
            return;
        };
        let size = item.size();
        let Some(record) = item.transfer.as_mut() else {
            return;
        };
        record_chunk_acked(record, size, index);
        let (progress, bytes_sent) = (record.progress, record.bytes_sent);
        let done = record.all_chunks_acked();
        debug!(
            target: "uplink.queue",
            item = %id,
            chunk = index,
            acked = record.acked_chunks(),
            total = record.chunks.len(),
            "Chunk acknowledged"
        );

        self.emit(UploadEvent::Progress {
            item: id,
            progress,
            bytes_sent,
        });
        self.emit_total_progress();

        if done {
            self.succeed_group(origin.group, Some(response));
        } else {
            self.pump_chunks(origin.group, id);
        }
    }

    fn on_failed(&mut self, origin: &Origin, message: String, response: Option<UploadResponse>) {
        self.retire_handle(origin);

        if let Some((id, index)) = origin.chunk {
            let limit = self.config.chunk_retry_limit;
            let retry = self
                .registry
                .get_mut(id)
                .and_then(|item| item.transfer.as_mut())
                .and_then(|record| {
                    let chunk = record.chunks.get_mut(index)?;
                    chunk.handle = None;
                    chunk.bytes_sent = 0;
                    let attempt = if chunk.retries < limit {
                        chunk.retries += 1;
                        chunk.status = ChunkStatus::Pending;
                        Some(chunk.retries)
                    } else {
                        chunk.status = ChunkStatus::Failed;
                        None
                    };
                    record.sum_chunk_bytes();
                    attempt
                });

            if let Some(attempt) = retry {
                warn!(
                    target: "uplink.queue",
                    item = %id,
                    chunk = index,
                    attempt,
                    error = %message,
                    "Retrying chunk"
                );
                self.emit(UploadEvent::ChunkRetry {
                    item: id,
                    index,
                    attempt,
                });
                self.pump_chunks(origin.group, id);
                return;
            }
            warn!(target: "uplink.queue", item = %id, chunk = index, "Chunk retries exhausted");
        }

        self.fail_group(origin.group, message, response);
    }

    /// Mark a handle finished and detach it from its items.
    fn retire_handle(&mut self, origin: &Origin) {
        if let Some(shared) = self.groups.handle_mut(origin.handle) {
            shared.mark_finished();
        }
        for id in &origin.members {
            if let Some(record) = self
                .registry
                .get_mut(*id)
                .and_then(|item| item.transfer.as_mut())
            {
                record.handles.remove(&origin.handle);
            }
        }
    }

    fn succeed_group(&mut self, group: GroupId, response: Option<UploadResponse>) {
        let Some(closed) = self.groups.close(group) else {
            return;
        };

        let mut finished = Vec::with_capacity(closed.members.len());
        for id in &closed.members {
            let Some(item) = self.registry.get_mut(*id) else {
                continue;
            };
            if item.status != ItemStatus::Uploading {
                continue;
            }
            let size = item.size();
            if let Some(record) = item.transfer.as_mut() {
                record_complete(record, size);
                record.handles.clear();
                finished.push((*id, record.bytes_sent));
            }
        }

        for (id, bytes_sent) in &finished {
            self.emit(UploadEvent::Progress {
                item: *id,
                progress: 100.0,
                bytes_sent: *bytes_sent,
            });
        }
        self.emit_total_progress();

        let mut succeeded = Vec::with_capacity(finished.len());
        for (id, _) in finished {
            if self.registry.set_status(id, ItemStatus::Success).is_err() {
                continue;
            }
            info!(target: "uplink.queue", item = %id, "Upload succeeded");
            self.emit(UploadEvent::Success {
                item: id,
                response: response.clone(),
            });
            self.emit(UploadEvent::Complete { item: id });
            succeeded.push(id);
        }

        if closed.kind == GroupKind::Grouped {
            self.emit(UploadEvent::GroupSuccess {
                items: succeeded,
                response,
            });
        }
        self.drain_pending = true;
    }

    /// Fail every uploading member of a group and abort its live requests.
    pub(super) fn fail_group(
        &mut self,
        group: GroupId,
        message: String,
        response: Option<UploadResponse>,
    ) {
        let aborted = self.groups.abort_group(group);
        if !aborted.is_empty() {
            debug!(
                target: "uplink.queue",
                group = %group,
                aborted = aborted.len(),
                "Aborted sibling requests"
            );
        }
        let Some(closed) = self.groups.close(group) else {
            return;
        };

        let mut failed = Vec::with_capacity(closed.members.len());
        for id in closed.members {
            if self.registry.set_status(id, ItemStatus::Error).is_err() {
                continue;
            }
            if let Some(item) = self.registry.get_mut(id) {
                item.error = Some(message.clone());
                if let Some(record) = item.transfer.as_mut() {
                    record.handles.clear();
                }
            }
            warn!(target: "uplink.queue", item = %id, error = %message, "Upload failed");
            self.emit(UploadEvent::error(id, message.clone(), response.clone()));
            self.emit(UploadEvent::Complete { item: id });
            failed.push(id);
        }

        if closed.kind == GroupKind::Grouped {
            self.emit(UploadEvent::GroupError {
                items: failed,
                message,
                response,
            });
        }
        self.drain_pending = true;
    }

    fn emit_total_progress(&self) {
        let total = aggregate(self.registry.iter());
        self.emit(UploadEvent::TotalProgress {
            progress: total.progress,
            bytes_sent: total.bytes_sent,
            total_bytes: total.total_bytes,
        });
    }
}
