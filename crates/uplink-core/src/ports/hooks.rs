//! Strategy hooks injected at construction.
//!
//! Each capability has its own named slot in [`UploadHooks`]. Closures
//! implement the single-method traits directly.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::item::UploadItem;

/// Verdict of a custom accept check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptDecision {
    Accept,
    Reject(String),
    /// Verdict arrives later through `resolve_validation`.
    Deferred,
}

/// Custom accept predicate, run after the size and type checks.
pub trait AcceptHook: Send + Sync {
    fn check(&self, item: &UploadItem) -> AcceptDecision;
}

impl<F> AcceptHook for F
where
    F: Fn(&UploadItem) -> AcceptDecision + Send + Sync,
{
    fn check(&self, item: &UploadItem) -> AcceptDecision {
        self(item)
    }
}

/// Outcome of a payload transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformDecision {
    /// Send the payload as is.
    Unchanged,
    /// Replace the payload.
    Ready(Bytes),
    /// Replacement arrives later through `complete_transform`.
    Deferred,
}

/// Payload transform, run when the item's transfer group starts.
pub trait TransformHook: Send + Sync {
    fn transform(&self, item: &UploadItem) -> TransformDecision;
}

impl<F> TransformHook for F
where
    F: Fn(&UploadItem) -> TransformDecision + Send + Sync,
{
    fn transform(&self, item: &UploadItem) -> TransformDecision {
        self(item)
    }
}

/// Decides the filename sent to the transport.
pub trait RenameHook: Send + Sync {
    fn rename(&self, item: &UploadItem) -> String;
}

impl<F> RenameHook for F
where
    F: Fn(&UploadItem) -> String + Send + Sync,
{
    fn rename(&self, item: &UploadItem) -> String {
        self(item)
    }
}

/// Endpoint a request is sent to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub method: String,
}

/// Picks the endpoint per request from the items it carries.
///
/// `configured` is the target from [`UploaderConfig`](crate::UploaderConfig);
/// return it unchanged to keep the static behavior.
pub trait RequestTargetHook: Send + Sync {
    fn target(&self, items: &[&UploadItem], configured: &RequestTarget) -> RequestTarget;
}

impl<F> RequestTargetHook for F
where
    F: Fn(&[&UploadItem], &RequestTarget) -> RequestTarget + Send + Sync,
{
    fn target(&self, items: &[&UploadItem], configured: &RequestTarget) -> RequestTarget {
        self(items, configured)
    }
}

/// Form field naming for request parts.
pub trait ParamNaming: Send + Sync {
    /// Field name for the part at `index`; `grouped` is true for multi-item requests.
    fn field_name(&self, base: &str, index: usize, grouped: bool) -> String;
}

/// `file` for single transfers, `file[0]`, `file[1]`, ... for grouped ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexedParamNaming;

impl ParamNaming for IndexedParamNaming {
    fn field_name(&self, base: &str, index: usize, grouped: bool) -> String {
        if grouped {
            format!("{base}[{index}]")
        } else {
            base.to_string()
        }
    }
}

/// Named capability slots.
#[derive(Clone)]
pub struct UploadHooks {
    pub accept: Option<Arc<dyn AcceptHook>>,
    pub transform: Option<Arc<dyn TransformHook>>,
    pub rename: Option<Arc<dyn RenameHook>>,
    pub target: Option<Arc<dyn RequestTargetHook>>,
    pub param_naming: Arc<dyn ParamNaming>,
}

impl Default for UploadHooks {
    fn default() -> Self {
        Self {
            accept: None,
            transform: None,
            rename: None,
            target: None,
            param_naming: Arc::new(IndexedParamNaming),
        }
    }
}

impl UploadHooks {
    /// Set the accept hook.
    #[must_use]
    pub fn with_accept(mut self, hook: impl AcceptHook + 'static) -> Self {
        self.accept = Some(Arc::new(hook));
        self
    }

    /// Set the transform hook.
    #[must_use]
    pub fn with_transform(mut self, hook: impl TransformHook + 'static) -> Self {
        self.transform = Some(Arc::new(hook));
        self
    }

    /// Set the rename hook.
    #[must_use]
    pub fn with_rename(mut self, hook: impl RenameHook + 'static) -> Self {
        self.rename = Some(Arc::new(hook));
        self
    }

    /// Set the per-request target hook.
    #[must_use]
    pub fn with_target(mut self, hook: impl RequestTargetHook + 'static) -> Self {
        self.target = Some(Arc::new(hook));
        self
    }

    /// Replace the field naming strategy.
    #[must_use]
    pub fn with_param_naming(mut self, naming: impl ParamNaming + 'static) -> Self {
        self.param_naming = Arc::new(naming);
        self
    }

    /// Filename to send for `item`.
    pub fn filename_for(&self, item: &UploadItem) -> String {
        self.rename
            .as_ref()
            .map_or_else(|| item.name.clone(), |hook| hook.rename(item))
    }

    /// Target for a request carrying `items`.
    pub fn target_for(&self, items: &[&UploadItem], configured: RequestTarget) -> RequestTarget {
        match &self.target {
            Some(hook) => hook.target(items, &configured),
            None => configured,
        }
    }
}

impl fmt::Debug for UploadHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadHooks")
            .field("accept", &self.accept.is_some())
            .field("transform", &self.transform.is_some())
            .field("rename", &self.rename.is_some())
            .field("target", &self.target.is_some())
            .finish_non_exhaustive()
    }
}
