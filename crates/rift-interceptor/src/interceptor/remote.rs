//! Interceptor applying its handlers on a remote mock process.

use super::core::InterceptorCore;
use super::types::{InterceptorError, Resolution};
use crate::config::InterceptorOptions;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::request::{HttpMethod, InterceptedRequest};
use crate::sync::{OperationKind, RemoteRequestHandler, SyncChannel, SyncOperation, Transport};
use crate::unhandled::{InterceptorKind, UnhandledRequestStrategy};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Intercepts requests reaching a mock process over a [`Transport`].
///
/// Declarations are mirrored locally and queued for the remote process in
/// call order. Remote interceptors never let unhandled requests through.
#[derive(Clone)]
pub struct RemoteHttpInterceptor {
    core: Arc<InterceptorCore>,
    channel: Arc<SyncChannel>,
    transport: Arc<dyn Transport>,
}

impl RemoteHttpInterceptor {
    pub fn new(
        options: InterceptorOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, InterceptorError> {
        Self::with_sink(options, transport, Arc::new(TracingSink))
    }

    pub fn with_sink(
        options: InterceptorOptions,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, InterceptorError> {
        let core = InterceptorCore::new(InterceptorKind::Remote, options, sink)?;
        Ok(Self {
            core: Arc::new(core),
            channel: Arc::new(SyncChannel::new()),
            transport,
        })
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn base_url(&self) -> &str {
        self.core.base_url()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Attach to the remote process. Fails, staying stopped, if the remote
    /// side does not acknowledge.
    pub async fn start(&self) -> Result<(), InterceptorError> {
        self.core.start()?;
        self.channel.connect(self.transport.clone());

        let attached = self
            .channel
            .enqueue(self.operation(OperationKind::Attach {
                base_url: self.core.base_url().to_string(),
            }))
            .await;
        if let Err(e) = attached {
            warn!("Could not attach interceptor on {}: {}", self.core.base_url(), e);
            self.channel.disconnect();
            self.core.stop()?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Detach from the remote process. Every handler is cleared and forgotten.
    pub async fn stop(&self) -> Result<(), InterceptorError> {
        self.core.stop()?;
        let detached = self.channel.enqueue(self.operation(OperationKind::Detach));
        self.channel.disconnect();
        detached.await?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Get, path)
    }

    pub fn post(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Post, path)
    }

    pub fn put(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Put, path)
    }

    pub fn patch(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Patch, path)
    }

    pub fn delete(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Delete, path)
    }

    pub fn head(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Head, path)
    }

    pub fn options(&self, path: &str) -> Result<RemoteRequestHandler, InterceptorError> {
        self.handler(HttpMethod::Options, path)
    }

    /// Register a handler locally and queue its registration remotely.
    pub fn handler(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Result<RemoteRequestHandler, InterceptorError> {
        let handler = self.core.register(method, path)?;
        Ok(RemoteRequestHandler::new(
            handler,
            self.core.id,
            self.channel.clone(),
        ))
    }

    /// Clear every handler, locally and on the remote process.
    pub async fn clear(&self) -> Result<(), InterceptorError> {
        if !self.core.is_running() {
            return Err(InterceptorError::NotStarted);
        }
        self.core.clear();
        self.channel
            .enqueue(self.operation(OperationKind::Reset))
            .await?;
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.core.handler_count()
    }

    pub fn check_times(&self) -> Result<(), InterceptorError> {
        self.core.check_times()
    }

    /// Replace the strategy for unhandled requests. A strategy resolving to
    /// bypass is treated as reject.
    pub fn set_unhandled_strategy(&self, strategy: Option<UnhandledRequestStrategy>) {
        self.core.set_strategy(strategy)
    }

    /// Dispatch a request received by the remote process.
    pub async fn resolve(
        &self,
        request: InterceptedRequest,
    ) -> Result<Resolution, InterceptorError> {
        self.core.resolve(request).await
    }

    fn operation(&self, kind: OperationKind) -> SyncOperation {
        SyncOperation::new(self.core.id, kind)
    }
}

impl std::fmt::Debug for RemoteHttpInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHttpInterceptor")
            .field("id", &self.core.id)
            .field("base_url", &self.core.base_url())
            .field("running", &self.core.is_running())
            .field("connected", &self.channel.is_connected())
            .finish()
    }
}
