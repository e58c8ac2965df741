//! Shared test infrastructure: a channel-backed transport, a scripted
//! remote end and event capture.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use uplink_core::{
    EventKind, ItemSource, TransferHandle, TransferRequest, Transport, TransportError,
    TransportSignal, UploadEvent, handler,
};
use uplink_queue::{SignalSender, Uploader};

static TRACING: Once = Once::new();

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Counts aborts issued by the engine.
pub struct CountingHandle(Arc<AtomicUsize>);

impl TransferHandle for CountingHandle {
    fn abort(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forwards every request to a channel.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<TransferRequest>,
    aborts: Arc<AtomicUsize>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransferRequest>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let aborts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                aborts: Arc::clone(&aborts),
            },
            rx,
            aborts,
        )
    }
}

impl Transport for ChannelTransport {
    fn send(
        &mut self,
        request: TransferRequest,
    ) -> Result<Box<dyn TransferHandle>, TransportError> {
        self.tx.send(request).map_err(|_| TransportError::Closed)?;
        Ok(Box::new(CountingHandle(Arc::clone(&self.aborts))))
    }
}

/// Scripted remote end: answers each request with the signals `respond`
/// returns and records what it saw.
pub fn spawn_remote<F>(
    mut requests: mpsc::UnboundedReceiver<TransferRequest>,
    signals: SignalSender,
    mut respond: F,
) -> (Arc<Mutex<Vec<TransferRequest>>>, JoinHandle<()>)
where
    F: FnMut(&TransferRequest) -> Vec<TransportSignal> + Send + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let task = tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            for signal in respond(&request) {
                signals.send(request.handle, signal);
            }
            log.lock().unwrap().push(request);
        }
    });
    (seen, task)
}

/// Stream every published event into a channel.
pub fn capture_events(uploader: &mut Uploader) -> mpsc::UnboundedReceiver<UploadEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    uploader.on_any(handler(move |event| {
        tx.send(event.clone())?;
        Ok(())
    }));
    rx
}

/// Collect events until one of `kind` arrives (inclusive).
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<UploadEvent>,
    kind: EventKind,
) -> Vec<UploadEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        let done = event.kind() == kind;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// `n` small text items.
pub fn sources(n: usize) -> Vec<ItemSource> {
    (0..n)
        .map(|i| {
            ItemSource::new(
                format!("file-{i}.txt"),
                "text/plain",
                Bytes::from(format!("payload {i}")),
            )
        })
        .collect()
}
