//! Port definitions (trait abstractions) for external collaborators.
//!
//! # Design Rules
//!
//! - No networking types in any signature
//! - Transports report back through signals, never by calling into the engine
//! - Hooks are single-method traits so closures can fill them

pub mod hooks;
pub mod transport;

pub use hooks::{
    AcceptDecision, AcceptHook, IndexedParamNaming, ParamNaming, RenameHook, RequestTarget,
    RequestTargetHook, TransformDecision, TransformHook, UploadHooks,
};
pub use transport::{
    ChunkParams, RequestOptions, RequestPart, ResponseBody, TransferHandle, TransferRequest,
    Transport, TransportError, TransportSignal, UploadResponse,
};
