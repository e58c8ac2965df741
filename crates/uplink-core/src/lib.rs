//! Core domain types and port definitions for uplink.
//!
//! Everything here is pure: item records and their status graph, lifecycle
//! events and the event bus, configuration, error types, and the traits the
//! engine in `uplink-queue` uses to reach transports and hooks.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod errors;
pub mod events;
pub mod item;
pub mod ports;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, ConfigLookup, DEFAULT_CHUNK_RETRY_LIMIT, DEFAULT_CONCURRENCY_BUDGET,
    DEFAULT_MAX_ITEM_SIZE, StaticConfigLookup, UploaderConfig, camelize, validate_config,
};
pub use errors::{RejectReason, UploadError, UploadResult};
pub use events::{EventBus, EventHandler, EventKind, UploadEvent, handler};
pub use item::{
    ChunkRecord, ChunkStatus, GroupId, HandleId, ItemId, ItemSource, ItemStatus, TransferRecord,
    UploadItem,
};
pub use ports::{
    AcceptDecision, AcceptHook, ChunkParams, IndexedParamNaming, ParamNaming, RenameHook,
    RequestOptions, RequestPart, RequestTarget, RequestTargetHook, ResponseBody, TransferHandle,
    TransferRequest, TransformDecision, TransformHook, Transport, TransportError, TransportSignal,
    UploadHooks, UploadResponse,
};
pub use utils::{AcceptFilter, bytes_to_mib, format_file_size};
