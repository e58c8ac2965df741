//! Transport port.
//!
//! The engine never performs I/O itself. It hands each request to a
//! [`Transport`], keeps the returned [`TransferHandle`] so it can abort it,
//! and is told about progress and completion through [`TransportSignal`]s
//! delivered back for the request's [`HandleId`].

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::item::{HandleId, ItemId};

/// One payload carried by a request.
#[derive(Clone, Debug)]
pub struct RequestPart {
    /// Item the payload belongs to.
    pub item: ItemId,
    /// Form field name (`file`, `file[0]`, ...).
    pub field_name: String,
    /// Filename presented to the remote end.
    pub filename: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Payload bytes (a slice of the item payload for chunked transfers).
    pub data: Bytes,
}

/// Pass-through request options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Endpoint.
    pub url: String,
    /// Method.
    pub method: String,
    /// Timeout the transport is expected to honor.
    pub timeout: Option<Duration>,
    /// Extra headers.
    pub headers: BTreeMap<String, String>,
    /// Send the single payload as the raw body instead of a form.
    pub binary_body: bool,
}

/// Chunk metadata sent with every chunk request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    /// Stable per-item id shared by all chunks.
    pub uuid: Uuid,
    /// Zero-based chunk index.
    pub index: usize,
    /// Number of chunks for the item.
    pub total_chunk_count: usize,
    /// Configured chunk size.
    pub chunk_size: u64,
    /// Offset of this chunk within the payload.
    pub byte_offset: u64,
    /// Size of the whole payload.
    pub total_file_size: u64,
}

impl ChunkParams {
    /// Render as form fields in a fixed order.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("uuid", self.uuid.to_string()),
            ("chunk_index", self.index.to_string()),
            ("total_file_size", self.total_file_size.to_string()),
            ("chunk_size", self.chunk_size.to_string()),
            ("total_chunk_count", self.total_chunk_count.to_string()),
            ("chunk_byte_offset", self.byte_offset.to_string()),
        ]
    }
}

/// Everything a transport needs to issue one request.
#[derive(Clone, Debug)]
pub struct TransferRequest {
    /// Handle the transport must report signals against.
    pub handle: HandleId,
    /// Payloads in send order.
    pub parts: Vec<RequestPart>,
    /// Pass-through options.
    pub options: RequestOptions,
    /// Present for chunk requests.
    pub chunk: Option<ChunkParams>,
}

impl TransferRequest {
    /// Items carried by this request, in send order.
    pub fn items(&self) -> Vec<ItemId> {
        self.parts.iter().map(|p| p.item).collect()
    }

    /// Total payload bytes in this request.
    pub fn payload_len(&self) -> u64 {
        self.parts.iter().map(|p| p.data.len() as u64).sum()
    }
}

/// Live request returned by a transport.
pub trait TransferHandle: Send {
    /// Abort the request. Repeated calls must be harmless.
    fn abort(&mut self);
}

/// Request issuer.
pub trait Transport: Send {
    /// Start a request. Signals for it arrive later, never from inside this call.
    fn send(&mut self, request: TransferRequest) -> Result<Box<dyn TransferHandle>, TransportError>;
}

/// Synchronous failure to start a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport refused the request.
    #[error("Request could not be sent: {0}")]
    Rejected(String),

    /// The transport has been shut down.
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Message suitable for item error state.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(msg) => msg.clone(),
            Self::Closed => "Upload transport is unavailable.".to_string(),
        }
    }
}

/// Progress or completion reported for a handle.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportSignal {
    /// Bytes written so far for the whole request.
    Progress {
        /// Bytes sent.
        bytes_sent: u64,
        /// Wire-level total, which may exceed the payload size.
        total_bytes: u64,
    },
    /// The remote end answered.
    Completed(UploadResponse),
    /// The request failed before or without a usable answer.
    Failed {
        /// Failure description.
        message: String,
        /// Response, when one was received.
        response: Option<UploadResponse>,
    },
}

/// Parsed response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

/// Remote response handed back by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Status code.
    pub status: u16,
    /// Body.
    pub body: ResponseBody,
}

impl UploadResponse {
    /// Create a response with the given status and body.
    #[must_use]
    pub const fn new(status: u16, body: ResponseBody) -> Self {
        Self { status, body }
    }

    /// Bodyless 200 response.
    #[must_use]
    pub const fn ok() -> Self {
        Self::new(200, ResponseBody::Empty)
    }

    /// Parse a raw body. JSON content types are decoded; undecodable JSON
    /// falls back to text.
    pub fn parse(status: u16, content_type: Option<&str>, raw: &str) -> Self {
        let body = if raw.is_empty() {
            ResponseBody::Empty
        } else if content_type.is_some_and(|ct| ct.contains("application/json")) {
            serde_json::from_str(raw).map_or_else(
                |_| ResponseBody::Text(raw.to_string()),
                ResponseBody::Json,
            )
        } else {
            ResponseBody::Text(raw.to_string())
        };
        Self { status, body }
    }

    /// 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// String `error` field of a JSON body.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Json(value) => value.get("error").and_then(Value::as_str),
            ResponseBody::Text(_) | ResponseBody::Empty => None,
        }
    }
}
