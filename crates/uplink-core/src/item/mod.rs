//! Item domain types.
//!
//! - `types` - Identity, status graph and the item record (`ItemId`, `ItemStatus`, `UploadItem`)
//! - `transfer` - Transfer bookkeeping (`TransferRecord`, `ChunkRecord`, `HandleId`, `GroupId`)

pub mod transfer;
pub mod types;

pub use transfer::{ChunkRecord, ChunkStatus, GroupId, HandleId, TransferRecord};
pub use types::{ItemId, ItemSource, ItemStatus, UploadItem};
