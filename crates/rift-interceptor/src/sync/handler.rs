//! Request handlers of remote interceptors.
//!
//! Declaration calls update the local handler right away and queue the same
//! change for the remote process. The handler can be awaited to wait until
//! every queued change was acknowledged.

use super::channel::{PendingAck, SyncChannel};
use super::operation::{Declaration, OperationKind, SyncOperation};
use super::transport::SyncError;
use crate::handler::{InterceptedEntry, RequestHandler, TimesBudget};
use crate::interceptor::InterceptorError;
use crate::predicate::Restriction;
use crate::request::{HttpMethod, InterceptedRequest};
use crate::response::ResponseProducer;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::IntoFuture;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Handler of a [`RemoteHttpInterceptor`](crate::RemoteHttpInterceptor).
///
/// Declaration methods return `&Self` and never block. Awaiting the handler
/// (or a reference to it) resolves once every change queued so far has been
/// acknowledged by the remote process, yielding a
/// [`SyncedRemoteRequestHandler`].
///
/// ```no_run
/// # use rift_interceptor::{MockResponse, RemoteHttpInterceptor, InterceptorError};
/// # async fn declare(interceptor: &RemoteHttpInterceptor) -> Result<(), InterceptorError> {
/// let handler = interceptor.get("/users")?;
/// handler.respond(MockResponse::ok().text("[]")).times(1).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RemoteRequestHandler {
    handler: RequestHandler,
    interceptor_id: Uuid,
    channel: Arc<SyncChannel>,
    pending: Arc<Mutex<Vec<Shared<PendingAck>>>>,
}

impl RemoteRequestHandler {
    pub(crate) fn new(
        handler: RequestHandler,
        interceptor_id: Uuid,
        channel: Arc<SyncChannel>,
    ) -> Self {
        let remote = Self {
            handler,
            interceptor_id,
            channel,
            pending: Arc::new(Mutex::new(Vec::new())),
        };
        remote.enqueue(OperationKind::RegisterEndpoint {
            handler_id: remote.handler.id(),
            method: remote.handler.method(),
            path: remote.handler.path().to_string(),
        });
        remote
    }

    pub fn with(&self, restriction: impl Into<Restriction>) -> &Self {
        let restriction = restriction.into();
        let description = format!("{restriction:?}");
        self.handler.with(restriction);
        self.declare(Declaration::Restrict {
            restriction: description,
        })
    }

    pub fn respond(&self, producer: impl Into<ResponseProducer>) -> &Self {
        let producer = producer.into();
        let status = match &producer {
            ResponseProducer::Static(response) => Some(response.status),
            ResponseProducer::Computed(_) => None,
        };
        self.handler.respond(producer);
        self.declare(Declaration::Respond { status })
    }

    pub fn times(&self, count: usize) -> &Self {
        self.handler.times(count);
        self.declare(Declaration::Times {
            budget: self.handler.budget(),
        })
    }

    pub fn times_between(&self, min: usize, max: usize) -> &Self {
        self.handler.times_between(min, max);
        self.declare(Declaration::Times {
            budget: self.handler.budget(),
        })
    }

    pub fn bypass(&self) -> &Self {
        self.handler.bypass();
        self.declare(Declaration::Bypass)
    }

    pub fn clear(&self) -> &Self {
        self.handler.clear();
        self.declare(Declaration::Clear)
    }

    pub fn id(&self) -> Uuid {
        self.handler.id()
    }

    pub fn method(&self) -> HttpMethod {
        self.handler.method()
    }

    pub fn path(&self) -> &str {
        self.handler.path()
    }

    pub fn is_bypassed(&self) -> bool {
        self.handler.is_bypassed()
    }

    pub fn has_response(&self) -> bool {
        self.handler.has_response()
    }

    pub fn budget(&self) -> TimesBudget {
        self.handler.budget()
    }

    pub fn match_count(&self) -> usize {
        self.handler.match_count()
    }

    pub fn requests(&self) -> Vec<InterceptedEntry> {
        self.handler.requests()
    }

    pub fn unmatched_requests(&self) -> Vec<InterceptedRequest> {
        self.handler.unmatched_requests()
    }

    /// The local bookkeeping handler.
    pub fn local(&self) -> &RequestHandler {
        &self.handler
    }

    /// Number of queued changes not acknowledged yet, failed ones included.
    pub fn pending_operations(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_synced(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn declare(&self, declaration: Declaration) -> &Self {
        self.enqueue(OperationKind::DeclareHandler {
            handler_id: self.handler.id(),
            declaration,
        });
        self
    }

    fn enqueue(&self, kind: OperationKind) {
        let ack = self
            .channel
            .enqueue(SyncOperation::new(self.interceptor_id, kind));
        self.pending.lock().push(ack.shared());
    }

    /// Wait for the changes queued so far. Changes queued while waiting are
    /// left for the next await.
    ///
    /// Only acknowledged changes leave the queue. A failed acknowledgement
    /// stays queued, so every later await reports it again.
    async fn flush(&self) -> Result<(), SyncError> {
        let outstanding = self.pending.lock().clone();
        let results = join_all(outstanding).await;
        self.pending
            .lock()
            .retain(|ack| !matches!(ack.peek(), Some(Ok(()))));
        results.into_iter().collect()
    }

    async fn into_synced(self) -> Result<SyncedRemoteRequestHandler, InterceptorError> {
        self.flush().await?;
        Ok(SyncedRemoteRequestHandler {
            handler: self,
            synced_at: Utc::now(),
        })
    }
}

impl IntoFuture for RemoteRequestHandler {
    type Output = Result<SyncedRemoteRequestHandler, InterceptorError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_synced().boxed()
    }
}

impl IntoFuture for &RemoteRequestHandler {
    type Output = Result<SyncedRemoteRequestHandler, InterceptorError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.clone().into_future()
    }
}

impl std::fmt::Debug for RemoteRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRequestHandler")
            .field("handler", &self.handler)
            .field("interceptor_id", &self.interceptor_id)
            .field("pending_operations", &self.pending_operations())
            .finish()
    }
}

/// A remote handler whose queued changes were all acknowledged.
///
/// Dereferences to the [`RemoteRequestHandler`] for every method, but cannot
/// itself be awaited. Declaration calls made through it queue new changes on
/// the underlying handler, which has to be awaited again.
///
/// ```compile_fail
/// # use rift_interceptor::SyncedRemoteRequestHandler;
/// async fn await_twice(synced: SyncedRemoteRequestHandler) {
///     let _ = synced.await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SyncedRemoteRequestHandler {
    handler: RemoteRequestHandler,
    synced_at: DateTime<Utc>,
}

impl SyncedRemoteRequestHandler {
    /// When the last pending change was acknowledged.
    pub fn synced_at(&self) -> DateTime<Utc> {
        self.synced_at
    }

    pub fn into_inner(self) -> RemoteRequestHandler {
        self.handler
    }
}

impl Deref for SyncedRemoteRequestHandler {
    type Target = RemoteRequestHandler;

    fn deref(&self) -> &Self::Target {
        &self.handler
    }
}
