//! Core interceptor state shared by local and remote interceptors.
//!
//! Owns the lifecycle flag, the handler registry and the unhandled request
//! strategy, and implements request dispatch.

use super::registry::HandlerRegistry;
use super::types::{InterceptorError, Resolution, UnhandledOutcome};
use crate::config::{InterceptorOptions, RequestSaving};
use crate::diagnostics::{Diagnostic, DiagnosticLevel, DiagnosticsSink};
use crate::handler::{RequestHandler, TimesCheckFailure};
use crate::predicate::{evaluate_restrictions, PathPattern};
use crate::request::{HttpMethod, InterceptedRequest};
use crate::unhandled::{
    resolve_declaration, InterceptorKind, UnhandledAction, UnhandledRequestStrategy,
};
use hyper::Uri;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) struct InterceptorCore {
    pub id: Uuid,
    pub kind: InterceptorKind,
    base_url: String,
    base_uri: Uri,
    request_saving: RequestSaving,
    running: AtomicBool,
    registry: Mutex<HandlerRegistry>,
    strategy: RwLock<Option<UnhandledRequestStrategy>>,
    sink: Arc<dyn DiagnosticsSink>,
    saved_requests: AtomicUsize,
    saving_limit_warned: AtomicBool,
}

impl InterceptorCore {
    pub fn new(
        kind: InterceptorKind,
        options: InterceptorOptions,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, InterceptorError> {
        options.validate()?;
        let base_uri = options.parsed_base_url()?;
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            base_uri,
            request_saving: options.request_saving,
            running: AtomicBool::new(false),
            registry: Mutex::new(HandlerRegistry::new()),
            strategy: RwLock::new(options.strategy()),
            sink,
            saved_requests: AtomicUsize::new(0),
            saving_limit_warned: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> Result<(), InterceptorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(InterceptorError::AlreadyRunning);
        }
        info!("{:?} interceptor started on {}", self.kind, self.base_url);
        Ok(())
    }

    /// Stop dispatching and empty the registry.
    pub fn stop(&self) -> Result<(), InterceptorError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(InterceptorError::NotRunning);
        }
        self.clear();
        info!("{:?} interceptor on {} stopped", self.kind, self.base_url);
        Ok(())
    }

    pub fn set_strategy(&self, strategy: Option<UnhandledRequestStrategy>) {
        *self.strategy.write() = strategy;
    }

    pub fn register(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Result<RequestHandler, InterceptorError> {
        if !self.is_running() {
            return Err(InterceptorError::NotStarted);
        }
        let pattern = PathPattern::parse(path)?;
        let handler = RequestHandler::new(method, pattern);
        self.registry.lock().register(handler.clone());
        debug!("Registered handler {} {} on {}", method, handler.path(), self.base_url);
        Ok(handler)
    }

    /// Clear every handler and remove it from the registry.
    pub fn clear(&self) {
        let handlers = self.registry.lock().drain();
        for handler in &handlers {
            handler.clear();
        }
        self.saved_requests.store(0, Ordering::SeqCst);
        self.saving_limit_warned.store(false, Ordering::SeqCst);
        debug!("Cleared {} handler(s) on {}", handlers.len(), self.base_url);
    }

    pub fn handler_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Check every handler's served count against its budget.
    pub fn check_times(&self) -> Result<(), InterceptorError> {
        let handlers = self.registry.lock().handlers();
        let violations: Vec<_> = handlers.iter().filter_map(RequestHandler::check_times).collect();
        if violations.is_empty() {
            return Ok(());
        }
        Err(InterceptorError::TimesCheckFailed(TimesCheckFailure { violations }))
    }

    /// Dispatch an inbound request.
    pub async fn resolve(
        &self,
        request: InterceptedRequest,
    ) -> Result<Resolution, InterceptorError> {
        if !self.is_running() {
            return Err(InterceptorError::NotRunning);
        }
        let Some(path) = self.relative_path(&request) else {
            return Ok(Resolution::Ignored);
        };

        if let Some(error) = &request.body_error {
            self.sink.log(
                DiagnosticLevel::Warn,
                Diagnostic::new(format!(
                    "Could not parse the request body ({error}); matching it as null"
                ))
                .with_request(&request),
            );
        }

        let candidates = self.registry.lock().candidates(request.method, &path);
        for candidate in candidates {
            let Some(snapshot) = candidate.handler.candidate() else {
                continue;
            };

            let mut matched_request = request.clone();
            matched_request.path_params = candidate.path_params;

            let restrictions_passed =
                match evaluate_restrictions(&snapshot.restrictions, &matched_request).await {
                    Ok(passed) => passed,
                    Err(e) => {
                        self.sink.log(
                            DiagnosticLevel::Warn,
                            Diagnostic::new(format!(
                                "Restriction of handler {} {} failed, treating as no match: {e:#}",
                                candidate.handler.method(),
                                candidate.handler.path()
                            ))
                            .with_request(&matched_request),
                        );
                        false
                    }
                };

            if !restrictions_passed {
                let save = self.track_saved_request();
                candidate.handler.record_mismatch(matched_request, save);
                continue;
            }

            let response = snapshot
                .producer
                .produce(&matched_request)
                .await
                .map_err(|source| InterceptorError::ResponseFailed {
                    method: candidate.handler.method(),
                    path: candidate.handler.path().to_string(),
                    source,
                })?;

            let save = self.track_saved_request();
            candidate
                .handler
                .record_match(matched_request, response.clone(), save);
            debug!(
                "{} {} handled by {} {}",
                request.method,
                request.url,
                candidate.handler.method(),
                candidate.handler.path()
            );
            return Ok(Resolution::Handled(response));
        }

        Ok(Resolution::Unhandled(self.resolve_unhandled(&request).await))
    }

    async fn resolve_unhandled(&self, request: &InterceptedRequest) -> UnhandledOutcome {
        let strategy = self.strategy.read().clone();
        let declaration =
            resolve_declaration(self.kind, strategy.as_ref(), request, self.sink.as_ref()).await;

        let (level, message, outcome) = match declaration.action {
            UnhandledAction::Bypass => (
                DiagnosticLevel::Warn,
                "Request was not handled and was performed as is",
                UnhandledOutcome::Bypass,
            ),
            UnhandledAction::Reject => (
                DiagnosticLevel::Error,
                "Request was not handled and was rejected",
                UnhandledOutcome::Reject {
                    method: request.method,
                    url: request.url.clone(),
                },
            ),
        };
        if declaration.should_log() {
            self.sink
                .log(level, Diagnostic::new(message).with_request(request));
        }
        outcome
    }

    /// Whether the next request recorded by a handler, matched or not, should
    /// be saved.
    fn track_saved_request(&self) -> bool {
        if !self.request_saving.enabled {
            return false;
        }
        let saved = self.saved_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if saved > self.request_saving.safe_limit
            && !self.saving_limit_warned.swap(true, Ordering::SeqCst)
        {
            warn!(
                "Interceptor on {} has saved {} requests, more than the safe limit of {}. \
                 Clear the interceptor regularly or disable request saving to limit memory usage.",
                self.base_url, saved, self.request_saving.safe_limit
            );
        }
        true
    }

    /// Request path relative to the base URL, if the request is addressed
    /// to this interceptor.
    fn relative_path(&self, request: &InterceptedRequest) -> Option<String> {
        if request.uri.scheme() != self.base_uri.scheme()
            || request.uri.authority() != self.base_uri.authority()
        {
            return None;
        }

        let base_path = self.base_uri.path().trim_end_matches('/');
        let path = request.path();
        if base_path.is_empty() {
            return Some(path.to_string());
        }
        match path.strip_prefix(base_path) {
            Some("") => Some("/".to_string()),
            Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
            _ => None,
        }
    }
}
