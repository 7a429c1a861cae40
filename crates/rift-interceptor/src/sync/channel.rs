//! Ordered delivery of operations to a transport.
//!
//! Operations are queued synchronously and sent one at a time by a worker
//! task, so the remote side applies them in call order. Each queued operation
//! yields an acknowledgement future that is independent of the channel.

use super::operation::SyncOperation;
use super::transport::{SyncError, Transport};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Acknowledgement of one queued operation.
pub(crate) type PendingAck = BoxFuture<'static, Result<(), SyncError>>;

struct Envelope {
    operation: SyncOperation,
    ack: oneshot::Sender<Result<(), SyncError>>,
}

#[derive(Default)]
pub(crate) struct SyncChannel {
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
}

impl SyncChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Spawn the worker delivering operations to `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, transport: Arc<dyn Transport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(transport, rx));
        *self.sender.lock() = Some(tx);
    }

    /// Stop accepting operations. Already queued operations are still sent.
    pub fn disconnect(&self) {
        self.sender.lock().take();
    }

    pub fn enqueue(&self, operation: SyncOperation) -> PendingAck {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            debug!("Dropping {}: not connected", operation.describe());
            return future::ready(Err(SyncError::NotConnected)).boxed();
        };

        let (ack, ack_rx) = oneshot::channel();
        if sender.send(Envelope { operation, ack }).is_err() {
            return future::ready(Err(SyncError::Disconnected)).boxed();
        }
        async move { ack_rx.await.unwrap_or(Err(SyncError::Disconnected)) }.boxed()
    }
}

async fn run_worker(transport: Arc<dyn Transport>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    debug!("Sync worker started");
    while let Some(Envelope { operation, ack }) = rx.recv().await {
        let description = operation.describe();
        let result = transport.send(operation).await;
        match &result {
            Ok(()) => debug!("Synced {}", description),
            Err(e) => warn!("Failed to sync {}: {}", description, e),
        }
        // The caller may have dropped its acknowledgement
        let _ = ack.send(result);
    }
    debug!("Sync worker stopped");
}
