//! In-process interceptor.

use super::core::InterceptorCore;
use super::types::{InterceptorError, Resolution};
use crate::config::InterceptorOptions;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::handler::RequestHandler;
use crate::request::{HttpMethod, InterceptedRequest};
use crate::unhandled::{InterceptorKind, UnhandledRequestStrategy};
use std::sync::Arc;

/// Intercepts requests made by the current process.
///
/// Handlers are declared synchronously and take effect immediately. Cloning
/// yields another handle to the same interceptor.
#[derive(Clone)]
pub struct HttpInterceptor {
    core: Arc<InterceptorCore>,
}

impl HttpInterceptor {
    pub fn new(options: InterceptorOptions) -> Result<Self, InterceptorError> {
        Self::with_sink(options, Arc::new(TracingSink))
    }

    /// Create an interceptor reporting diagnostics to a custom sink.
    pub fn with_sink(
        options: InterceptorOptions,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, InterceptorError> {
        let core = InterceptorCore::new(InterceptorKind::Local, options, sink)?;
        Ok(Self {
            core: Arc::new(core),
        })
    }

    pub fn base_url(&self) -> &str {
        self.core.base_url()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn start(&self) -> Result<(), InterceptorError> {
        self.core.start()
    }

    /// Stop intercepting. Every handler is cleared and forgotten.
    pub fn stop(&self) -> Result<(), InterceptorError> {
        self.core.stop()
    }

    pub fn get(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Get, path)
    }

    pub fn post(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Post, path)
    }

    pub fn put(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Put, path)
    }

    pub fn patch(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Patch, path)
    }

    pub fn delete(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Delete, path)
    }

    pub fn head(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Head, path)
    }

    pub fn options(&self, path: &str) -> Result<RequestHandler, InterceptorError> {
        self.handler(HttpMethod::Options, path)
    }

    /// Register a handler for `method` and a path pattern relative to the
    /// base URL. Patterns may contain `:name` parameters.
    pub fn handler(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Result<RequestHandler, InterceptorError> {
        self.core.register(method, path)
    }

    /// Clear and remove every handler.
    pub fn clear(&self) {
        self.core.clear()
    }

    pub fn handler_count(&self) -> usize {
        self.core.handler_count()
    }

    /// Fail if any handler was not matched the expected number of times.
    pub fn check_times(&self) -> Result<(), InterceptorError> {
        self.core.check_times()
    }

    /// Replace the strategy for unhandled requests. `None` restores the
    /// process-wide default.
    pub fn set_unhandled_strategy(&self, strategy: Option<UnhandledRequestStrategy>) {
        self.core.set_strategy(strategy)
    }

    /// Dispatch a request to the registered handlers.
    pub async fn resolve(
        &self,
        request: InterceptedRequest,
    ) -> Result<Resolution, InterceptorError> {
        self.core.resolve(request).await
    }
}

impl std::fmt::Debug for HttpInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInterceptor")
            .field("id", &self.core.id)
            .field("base_url", &self.core.base_url())
            .field("running", &self.core.is_running())
            .finish()
    }
}
