//! Synchronous publish/subscribe for [`UploadEvent`]s.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use super::{EventKind, UploadEvent};

/// Subscriber callback.
///
/// Handlers are compared by `Arc` identity when unsubscribing, so keep the
/// `Arc` around if you intend to remove a single handler later.
pub type EventHandler = Arc<dyn Fn(&UploadEvent) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&UploadEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered list of subscribers keyed by event kind.
///
/// `None` subscribes to every kind. Delivery follows registration order
/// across all subscriptions. A handler that returns `Err` or panics is
/// logged and skipped; the remaining handlers still receive the event.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(Option<EventKind>, EventHandler)>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> &mut Self {
        self.handlers.push((Some(kind), handler));
        self
    }

    /// Subscribe to every event.
    pub fn on_any(&mut self, handler: EventHandler) -> &mut Self {
        self.handlers.push((None, handler));
        self
    }

    /// Remove every handler registered for `kind`.
    pub fn off(&mut self, kind: EventKind) -> &mut Self {
        self.handlers.retain(|(k, _)| *k != Some(kind));
        self
    }

    /// Remove one handler instance registered for `kind`.
    pub fn off_handler(&mut self, kind: EventKind, handler: &EventHandler) -> &mut Self {
        if let Some(pos) = self
            .handlers
            .iter()
            .position(|(k, h)| *k == Some(kind) && Arc::ptr_eq(h, handler))
        {
            self.handlers.remove(pos);
        }
        self
    }

    /// Remove every handler.
    pub fn off_all(&mut self) -> &mut Self {
        self.handlers.clear();
        self
    }

    /// Number of handlers that would receive an event of `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers
            .iter()
            .filter(|(k, _)| k.is_none_or(|k| k == kind))
            .count()
    }

    /// Deliver an event to every matching handler.
    pub fn emit(&self, event: &UploadEvent) -> &Self {
        let kind = event.kind();
        trace!(target: "uplink.events", event = %kind, "Emitting event");

        for (_, handler) in self
            .handlers
            .iter()
            .filter(|(k, _)| k.is_none_or(|k| k == kind))
        {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        target: "uplink.events",
                        event = %kind,
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    warn!(target: "uplink.events", event = %kind, "Event handler panicked");
                }
            }
        }
        self
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::item::ItemId;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> EventHandler {
        let log = Arc::clone(log);
        handler(move |event| {
            log.lock().unwrap().push(format!("{tag}:{}", event.kind()));
            Ok(())
        })
    }

    fn queued() -> UploadEvent {
        UploadEvent::Queued { item: ItemId::new(1) }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::Queued, recorder(&log, "a"))
            .on_any(recorder(&log, "any"))
            .on(EventKind::Queued, recorder(&log, "b"))
            .on(EventKind::Reset, recorder(&log, "reset"));

        bus.emit(&queued());
        assert_eq!(*log.lock().unwrap(), ["a:queued", "any:queued", "b:queued"]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::Queued, handler(|_| anyhow::bail!("nope")))
            .on(EventKind::Queued, handler(|_| panic!("boom")))
            .on(EventKind::Queued, recorder(&log, "last"));

        bus.emit(&queued());
        assert_eq!(*log.lock().unwrap(), ["last:queued"]);
    }

    #[test]
    fn test_off_variants() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let keep = recorder(&log, "keep");
        let drop_me = recorder(&log, "drop");
        let mut bus = EventBus::new();
        bus.on(EventKind::Queued, Arc::clone(&keep))
            .on(EventKind::Queued, Arc::clone(&drop_me))
            .on(EventKind::Reset, recorder(&log, "reset"));

        bus.off_handler(EventKind::Queued, &drop_me);
        assert_eq!(bus.listener_count(EventKind::Queued), 1);

        bus.off(EventKind::Reset);
        assert_eq!(bus.listener_count(EventKind::Reset), 0);
        assert_eq!(bus.listener_count(EventKind::Queued), 1);

        bus.emit(&queued());
        assert_eq!(*log.lock().unwrap(), ["keep:queued"]);

        bus.off_all();
        assert_eq!(bus.listener_count(EventKind::Queued), 0);
    }

    #[test]
    fn test_off_handler_removes_single_instance() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let twice = recorder(&log, "twice");
        let mut bus = EventBus::new();
        bus.on(EventKind::Queued, Arc::clone(&twice))
            .on(EventKind::Queued, Arc::clone(&twice));

        bus.off_handler(EventKind::Queued, &twice);
        bus.emit(&queued());
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
