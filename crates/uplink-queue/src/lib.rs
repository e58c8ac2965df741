//! Upload queue engine for uplink.
//!
//! [`Uploader`] validates items, queues them under a concurrency budget,
//! builds single, grouped or chunked transfers, and reacts to transport
//! signals. It is synchronous and performs no I/O; [`UploadRunner`] drives it
//! from a tokio runtime.
//!
//! - `registry` - insertion-ordered item storage and the status graph
//! - `validator` - size, type and capacity checks
//! - `scheduler` - slot accounting and batch selection
//! - `groups` - transfer groups, shared handles and chunk planning
//! - `progress` - per-item and aggregate progress
//! - `uploader` - the controller
//! - `runner` - async signal pump
#![deny(unused_crate_dependencies)]

// Re-export core types for convenience
pub use uplink_core::{
    AcceptDecision, EventKind, ItemId, ItemSource, ItemStatus, RejectReason, TransportSignal,
    UploadError, UploadEvent, UploadHooks, UploadItem, UploadResponse, UploadResult,
    UploaderConfig,
};

pub mod groups;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod uploader;
pub mod validator;

pub use groups::{GroupKind, TransferPlan};
pub use progress::TotalProgress;
pub use registry::ItemRegistry;
pub use runner::{
    SignalEnvelope, SignalReceiver, SignalSender, UploadRunner, drain_signals, signal_channel,
};
pub use scheduler::{Scheduler, SelectionFilter};
pub use uploader::Uploader;
pub use validator::{CapacityGate, Validator};

// Dev-dependencies only used by integration tests
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tracing_subscriber as _;
