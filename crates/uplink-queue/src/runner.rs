//! Async driver for the synchronous [`Uploader`].
//!
//! Transports report progress and completion from their own tasks by
//! sending [`SignalEnvelope`]s through a [`SignalSender`]. The runner owns the
//! uploader behind a mutex and applies each signal in arrival order, so the
//! core never sees two signals at once.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use uplink_core::{HandleId, TransportSignal, UploadResponse};

use crate::uploader::Uploader;

/// A signal addressed to the request it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalEnvelope {
    pub handle: HandleId,
    pub signal: TransportSignal,
}

/// Receiving half of a signal channel.
pub type SignalReceiver = mpsc::UnboundedReceiver<SignalEnvelope>;

/// Cloneable sending half handed to transports.
#[derive(Clone, Debug)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<SignalEnvelope>,
}

impl SignalSender {
    /// Send a signal. Returns false once the receiving side is gone.
    pub fn send(&self, handle: HandleId, signal: TransportSignal) -> bool {
        self.tx.send(SignalEnvelope { handle, signal }).is_ok()
    }

    pub fn progress(&self, handle: HandleId, bytes_sent: u64, total_bytes: u64) -> bool {
        self.send(
            handle,
            TransportSignal::Progress {
                bytes_sent,
                total_bytes,
            },
        )
    }

    pub fn completed(&self, handle: HandleId, response: UploadResponse) -> bool {
        self.send(handle, TransportSignal::Completed(response))
    }

    pub fn failed(
        &self,
        handle: HandleId,
        message: impl Into<String>,
        response: Option<UploadResponse>,
    ) -> bool {
        self.send(
            handle,
            TransportSignal::Failed {
                message: message.into(),
                response,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a signal channel.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, rx)
}

/// Apply every signal already waiting in `rx`. Returns how many were applied
/// (signals for retired handles are not counted).
pub fn drain_signals(uploader: &mut Uploader, rx: &mut SignalReceiver) -> usize {
    let mut applied = 0;
    while let Ok(SignalEnvelope { handle, signal }) = rx.try_recv() {
        if uploader.handle_signal(handle, signal) {
            applied += 1;
        }
    }
    applied
}

/// Background task pumping transport signals into an [`Uploader`].
pub struct UploadRunner {
    uploader: Arc<Mutex<Uploader>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl UploadRunner {
    /// Take ownership of `uploader` and start applying signals from `rx`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(uploader: Uploader, rx: SignalReceiver) -> Self {
        let uploader = Arc::new(Mutex::new(uploader));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(Arc::clone(&uploader), rx, cancel.clone()));
        Self {
            uploader,
            cancel,
            task,
        }
    }

    /// Run `f` with exclusive access to the uploader.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Uploader) -> R) -> R {
        let mut guard = self.uploader.lock().await;
        f(&mut guard)
    }

    /// Shared handle to the uploader.
    pub fn uploader(&self) -> Arc<Mutex<Uploader>> {
        Arc::clone(&self.uploader)
    }

    /// Stop the pump. Signals still queued are dropped.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.task.await.context("signal pump task failed")?;
        debug!(target: "uplink.queue", "Upload runner stopped");
        Ok(())
    }
}

impl std::fmt::Debug for UploadRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRunner")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

async fn pump(uploader: Arc<Mutex<Uploader>>, mut rx: SignalReceiver, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            envelope = rx.recv() => {
                let Some(SignalEnvelope { handle, signal }) = envelope else {
                    debug!(target: "uplink.queue", "Signal channel closed");
                    break;
                };
                if !uploader.lock().await.handle_signal(handle, signal) {
                    trace!(target: "uplink.queue", handle = %handle, "Signal dropped");
                }
            }
        }
    }
}
