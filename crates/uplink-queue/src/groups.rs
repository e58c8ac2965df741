//! Transfer groups and shared transport handles.
//!
//! A [`TransferGroup`] is the unit that occupies one concurrency slot. It is
//! either a single item, several items sharing one request, or one item
//! split into chunk requests. Every request the engine issues is recorded as
//! a [`SharedHandle`] owning the list of items it carries.
//!
//! INVARIANT: `GroupTable` contains ONLY groups with at least one
//! non-terminal member. Terminal paths (success, error, cancel) MUST remove
//! the group, which also retires its handles.

// Chunk offsets index into in-memory payloads, so they always fit in usize
#![allow(clippy::cast_possible_truncation)]

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use indexmap::IndexMap;

use uplink_core::{ChunkRecord, GroupId, HandleId, ItemId, TransferHandle};

/// How a batch of items is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferPlan {
    /// One item, one request (may become chunked once its size is final).
    Single(ItemId),
    /// Several items bundled into one request.
    Grouped(Vec<ItemId>),
}

impl TransferPlan {
    /// Partition a selected batch into plans.
    pub fn for_batch(batch: &[ItemId], grouped: bool) -> Vec<Self> {
        if batch.is_empty() {
            Vec::new()
        } else if grouped {
            vec![Self::Grouped(batch.to_vec())]
        } else {
            batch.iter().copied().map(Self::Single).collect()
        }
    }

    /// Members in send order.
    pub fn members(&self) -> Vec<ItemId> {
        match self {
            Self::Single(id) => vec![*id],
            Self::Grouped(ids) => ids.clone(),
        }
    }
}

/// Shape of a started group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Single,
    Grouped,
    Chunked,
}

/// Where a group is in its startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupPhase {
    /// Waiting for deferred payload transforms of these members.
    AwaitingTransform(BTreeSet<ItemId>),
    /// Requests have been issued.
    InFlight,
}

/// Items that occupy one concurrency slot together.
#[derive(Clone, Debug)]
pub struct TransferGroup {
    pub id: GroupId,
    pub kind: GroupKind,
    pub members: Vec<ItemId>,
    pub phase: GroupPhase,
    pub handles: BTreeSet<HandleId>,
}

/// One outstanding request shared by its member items.
pub struct SharedHandle {
    pub id: HandleId,
    pub group: GroupId,
    pub members: Vec<ItemId>,
    /// `(item, chunk index)` for chunk requests.
    pub chunk: Option<(ItemId, usize)>,
    aborted: bool,
    finished: bool,
    inner: Box<dyn TransferHandle>,
}

impl SharedHandle {
    pub fn new(
        id: HandleId,
        group: GroupId,
        members: Vec<ItemId>,
        chunk: Option<(ItemId, usize)>,
        inner: Box<dyn TransferHandle>,
    ) -> Self {
        Self {
            id,
            group,
            members,
            chunk,
            aborted: false,
            finished: false,
            inner,
        }
    }

    /// Abort the underlying request unless it already ended. Returns whether
    /// an abort was actually issued.
    pub fn abort_once(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.aborted = true;
        self.inner.abort();
        true
    }

    /// Record that the transport reported a terminal signal.
    pub const fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Neither aborted nor finished.
    pub const fn is_live(&self) -> bool {
        !self.aborted && !self.finished
    }

    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl std::fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHandle")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("members", &self.members)
            .field("chunk", &self.chunk)
            .field("aborted", &self.aborted)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Active groups and their handles.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: IndexMap<GroupId, TransferGroup>,
    handles: HashMap<HandleId, SharedHandle>,
    next_group: u64,
    next_handle: u64,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group for a plan. Starts in `InFlight`; the caller parks it
    /// if transforms are pending.
    pub fn open(&mut self, plan: &TransferPlan) -> GroupId {
        self.next_group += 1;
        let id = GroupId::new(self.next_group);
        let kind = match plan {
            TransferPlan::Single(_) => GroupKind::Single,
            TransferPlan::Grouped(_) => GroupKind::Grouped,
        };
        self.groups.insert(
            id,
            TransferGroup {
                id,
                kind,
                members: plan.members(),
                phase: GroupPhase::InFlight,
                handles: BTreeSet::new(),
            },
        );
        id
    }

    pub fn get(&self, id: GroupId) -> Option<&TransferGroup> {
        self.groups.get(&id)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut TransferGroup> {
        self.groups.get_mut(&id)
    }

    /// Group an item currently belongs to.
    pub fn group_of(&self, item: ItemId) -> Option<GroupId> {
        self.groups
            .values()
            .find(|group| group.members.contains(&item))
            .map(|group| group.id)
    }

    /// Number of slots in use.
    pub fn active_count(&self) -> usize {
        self.groups.len()
    }

    /// Mint an id for a request about to be sent.
    pub fn next_handle_id(&mut self) -> HandleId {
        self.next_handle += 1;
        HandleId::new(self.next_handle)
    }

    /// Track a request that the transport accepted.
    pub fn attach(&mut self, handle: SharedHandle) {
        if let Some(group) = self.groups.get_mut(&handle.group) {
            group.handles.insert(handle.id);
        }
        self.handles.insert(handle.id, handle);
    }

    pub fn handle(&self, id: HandleId) -> Option<&SharedHandle> {
        self.handles.get(&id)
    }

    pub fn handle_mut(&mut self, id: HandleId) -> Option<&mut SharedHandle> {
        self.handles.get_mut(&id)
    }

    /// Abort every live handle of a group. Returns the handles aborted.
    pub fn abort_group(&mut self, id: GroupId) -> Vec<HandleId> {
        let Some(group) = self.groups.get(&id) else {
            return Vec::new();
        };
        group
            .handles
            .iter()
            .filter(|hid| {
                self.handles
                    .get_mut(hid)
                    .is_some_and(SharedHandle::abort_once)
            })
            .copied()
            .collect()
    }

    /// Remove a group and retire its handles.
    pub fn close(&mut self, id: GroupId) -> Option<TransferGroup> {
        let group = self.groups.shift_remove(&id)?;
        for hid in &group.handles {
            self.handles.remove(hid);
        }
        Some(group)
    }

    /// Number of handles that are neither aborted nor finished.
    pub fn live_handles(&self) -> usize {
        self.handles.values().filter(|h| h.is_live()).count()
    }
}

/// Split a payload of `size` bytes into ordered chunk records.
///
/// An empty payload still yields one (empty) chunk so that the item is
/// acknowledged by the remote end.
pub fn plan_chunks(size: u64, chunk_size: u64) -> Vec<ChunkRecord> {
    if chunk_size == 0 {
        return Vec::new();
    }
    let count = size.div_ceil(chunk_size).max(1);
    (0..count)
        .map(|index| {
            let offset = index * chunk_size;
            let len = chunk_size.min(size.saturating_sub(offset));
            ChunkRecord::new(index as usize, offset, len)
        })
        .collect()
}

/// Slice the bytes of one chunk out of a payload.
pub fn chunk_bytes(payload: &Bytes, chunk: &ChunkRecord) -> Bytes {
    let start = (chunk.offset as usize).min(payload.len());
    let end = (chunk.end() as usize).min(payload.len());
    payload.slice(start..end)
}
