//! Uploader configuration, validation and per-identifier lookup.
//!
//! These are pure domain types with no infrastructure dependencies beyond
//! reading a JSON file in [`UploaderConfig::from_path`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::AcceptFilter;

/// Default number of transfer groups allowed in flight.
pub const DEFAULT_CONCURRENCY_BUDGET: usize = 2;

/// Default maximum payload size (256 MiB).
pub const DEFAULT_MAX_ITEM_SIZE: u64 = 256 * 1024 * 1024;

/// Default number of retries spent on a failing chunk.
pub const DEFAULT_CHUNK_RETRY_LIMIT: u32 = 3;

/// Default request timeout handed to the transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Uploader configuration.
///
/// Every field has a default, so partial JSON documents deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploaderConfig {
    /// Endpoint passed through to the transport.
    pub url: String,

    /// HTTP method (or equivalent) passed through to the transport.
    pub method: String,

    /// Request timeout in seconds; `None` disables the timeout.
    pub timeout_secs: Option<u64>,

    /// Extra request headers passed through to the transport.
    pub headers: BTreeMap<String, String>,

    /// Number of transfer groups allowed in flight at once.
    pub concurrency_budget: usize,

    /// Maximum number of accepted items; `None` is unlimited, `Some(0)` disables uploads.
    pub max_items: Option<usize>,

    /// Maximum payload size in bytes.
    pub max_item_size: u64,

    /// Comma-separated accept list (`image/*, application/pdf, .psd`).
    pub accept_filter: Option<String>,

    /// Enqueue items as soon as they are accepted.
    pub auto_enqueue: bool,

    /// Start transfers automatically on enqueue, completion and cancellation.
    pub auto_process_queue: bool,

    /// Bundle each selected batch into a single transport request.
    pub grouped_transfer: bool,

    /// Send the raw payload as the request body instead of a multipart form.
    pub binary_body: bool,

    /// Chunk size in bytes; 0 disables chunking.
    pub chunk_size_bytes: u64,

    /// Chunk even payloads that fit in a single chunk.
    pub force_chunking: bool,

    /// Dispatch chunks of one item concurrently.
    pub parallel_chunk_uploads: bool,

    /// Upper bound on concurrently dispatched chunks per item.
    pub max_parallel_chunks: Option<usize>,

    /// Retries spent on a failing chunk before the item errors.
    pub chunk_retry_limit: u32,

    /// Base form field name for payloads.
    pub param_name: String,

    /// 1000 or 1024; used when formatting sizes for humans.
    pub file_size_base: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            headers: BTreeMap::new(),
            concurrency_budget: DEFAULT_CONCURRENCY_BUDGET,
            max_items: None,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            accept_filter: None,
            auto_enqueue: true,
            auto_process_queue: true,
            grouped_transfer: false,
            binary_body: false,
            chunk_size_bytes: 0,
            force_chunking: false,
            parallel_chunk_uploads: false,
            max_parallel_chunks: None,
            chunk_retry_limit: DEFAULT_CHUNK_RETRY_LIMIT,
            param_name: "file".to_string(),
            file_size_base: 1000,
        }
    }
}

impl UploaderConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)
    }

    /// Whether chunking is configured at all.
    #[must_use]
    pub const fn chunking_enabled(&self) -> bool {
        self.chunk_size_bytes > 0
    }

    /// Whether a payload of `size` bytes should be split into chunks.
    #[must_use]
    pub const fn should_chunk(&self, size: u64) -> bool {
        self.chunking_enabled() && (self.force_chunking || size > self.chunk_size_bytes)
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Parsed accept filter.
    #[must_use]
    pub fn accept(&self) -> AcceptFilter {
        AcceptFilter::from_option(self.accept_filter.as_deref())
    }

    /// Effective in-flight chunk cap for one item.
    #[must_use]
    pub fn chunk_parallelism(&self) -> usize {
        if self.parallel_chunk_uploads {
            self.max_parallel_chunks.unwrap_or(usize::MAX)
        } else {
            1
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("You cannot set both grouped_transfer and chunking")]
    GroupedWithChunking,

    #[error("You cannot set both grouped_transfer and binary_body")]
    GroupedWithBinaryBody,

    #[error("force_chunking requires a non-zero chunk_size_bytes")]
    ForceChunkingWithoutSize,

    #[error("param_name cannot be empty")]
    EmptyParamName,

    #[error("max_parallel_chunks must be at least 1")]
    ZeroParallelChunks,

    #[error("file_size_base must be at least 2, got {0}")]
    InvalidFileSizeBase(u64),

    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Validate configuration values and reject conflicting transfer modes.
pub fn validate_config(config: &UploaderConfig) -> Result<(), ConfigError> {
    if config.grouped_transfer && config.chunking_enabled() {
        return Err(ConfigError::GroupedWithChunking);
    }

    if config.grouped_transfer && config.binary_body {
        return Err(ConfigError::GroupedWithBinaryBody);
    }

    if config.force_chunking && !config.chunking_enabled() {
        return Err(ConfigError::ForceChunkingWithoutSize);
    }

    if config.param_name.trim().is_empty() {
        return Err(ConfigError::EmptyParamName);
    }

    if config.max_parallel_chunks == Some(0) {
        return Err(ConfigError::ZeroParallelChunks);
    }

    if config.file_size_base < 2 {
        return Err(ConfigError::InvalidFileSizeBase(config.file_size_base));
    }

    Ok(())
}

/// Turn `my-upload_area` into `myUploadArea`.
#[must_use]
pub fn camelize(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut chars = identifier.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '-' | '_') {
            match chars.peek() {
                Some(next) if next.is_alphanumeric() || *next == '_' => {
                    let next = *next;
                    chars.next();
                    out.extend(next.to_uppercase());
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Lookup service resolving per-identifier configuration.
///
/// Passed into the uploader at construction instead of living in a
/// process-wide map.
pub trait ConfigLookup: Send + Sync {
    /// Configuration registered for `identifier`, if any.
    fn lookup(&self, identifier: &str) -> Option<UploaderConfig>;
}

/// In-memory [`ConfigLookup`] keyed by camelized identifier.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigLookup {
    entries: HashMap<String, UploaderConfig>,
}

impl StaticConfigLookup {
    /// Create an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register configuration for an identifier (builder style).
    #[must_use]
    pub fn with(mut self, identifier: &str, config: UploaderConfig) -> Self {
        self.insert(identifier, config);
        self
    }

    /// Register configuration for an identifier.
    pub fn insert(&mut self, identifier: &str, config: UploaderConfig) {
        self.entries.insert(camelize(identifier), config);
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigLookup for StaticConfigLookup {
    fn lookup(&self, identifier: &str) -> Option<UploaderConfig> {
        self.entries.get(&camelize(identifier)).cloned()
    }
}
