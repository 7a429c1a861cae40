//! Diagnostics sink for unhandled requests and recoverable failures.
//!
//! The default [`TracingSink`] turns diagnostics into `tracing` events with
//! structured fields. Tests can plug in their own sink to assert on what was
//! reported.

use crate::request::InterceptedRequest;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Request fields included in a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub search_params: Vec<(String, String)>,
    pub body: String,
}

impl From<&InterceptedRequest> for RequestSummary {
    fn from(request: &InterceptedRequest) -> Self {
        Self {
            method: request.method.to_string(),
            url: request.url.clone(),
            path: request.path().to_string(),
            headers: request.header_pairs(),
            search_params: request.search_params.clone(),
            body: request.body.describe(),
        }
    }
}

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub request: Option<RequestSummary>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request: None,
        }
    }

    pub fn with_request(mut self, request: &InterceptedRequest) -> Self {
        self.request = Some(RequestSummary::from(request));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(request) = &self.request {
            write!(f, ": {} {}", request.method, request.url)?;
        }
        Ok(())
    }
}

/// Receives diagnostics from the dispatcher.
pub trait DiagnosticsSink: Send + Sync {
    fn log(&self, level: DiagnosticLevel, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn log(&self, level: DiagnosticLevel, diagnostic: Diagnostic) {
        let Some(request) = &diagnostic.request else {
            match level {
                DiagnosticLevel::Debug => debug!("{}", diagnostic.message),
                DiagnosticLevel::Info => info!("{}", diagnostic.message),
                DiagnosticLevel::Warn => warn!("{}", diagnostic.message),
                DiagnosticLevel::Error => error!("{}", diagnostic.message),
            }
            return;
        };

        let headers = format!("{:?}", request.headers);
        let search_params = format!("{:?}", request.search_params);
        macro_rules! emit {
            ($macro:ident) => {
                $macro!(
                    method = %request.method,
                    url = %request.url,
                    headers = %headers,
                    search_params = %search_params,
                    body = %request.body,
                    "{}",
                    diagnostic.message
                )
            };
        }
        match level {
            DiagnosticLevel::Debug => emit!(debug),
            DiagnosticLevel::Info => emit!(info),
            DiagnosticLevel::Warn => emit!(warn),
            DiagnosticLevel::Error => emit!(error),
        }
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(DiagnosticLevel, Diagnostic)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(DiagnosticLevel, Diagnostic)> {
        self.entries.lock().clone()
    }

    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn log(&self, level: DiagnosticLevel, diagnostic: Diagnostic) {
        self.entries.lock().push((level, diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Body, HttpMethod};
    use serde_json::json;
    use tracing_test::traced_test;

    fn request() -> InterceptedRequest {
        InterceptedRequest::new(HttpMethod::Get, "http://localhost/orders?page=2")
            .unwrap()
            .with_header("accept", "application/json")
            .unwrap()
            .with_body(Body::json(json!({"filter": "open"})))
    }

    #[test]
    fn test_summary_contains_request_fields() {
        let diagnostic = Diagnostic::new("Request was not handled").with_request(&request());
        let summary = diagnostic.request.clone().unwrap();

        assert_eq!(summary.method, "GET");
        assert_eq!(summary.path, "/orders");
        assert_eq!(summary.search_params, vec![("page".to_string(), "2".to_string())]);
        assert!(summary
            .headers
            .contains(&("accept".to_string(), "application/json".to_string())));
        assert_eq!(summary.body, r#"{"filter":"open"}"#);
        assert_eq!(
            diagnostic.to_string(),
            "Request was not handled: GET http://localhost/orders?page=2"
        );
    }

    #[test]
    #[traced_test]
    fn test_tracing_sink_emits_fields() {
        TracingSink.log(
            DiagnosticLevel::Warn,
            Diagnostic::new("Request was not handled").with_request(&request()),
        );
        assert!(logs_contain("Request was not handled"));
        assert!(logs_contain("method=GET"));
        assert!(logs_contain("url=http://localhost/orders?page=2"));
    }

    #[test]
    fn test_memory_sink_counts_by_level() {
        let sink = MemorySink::new();
        sink.log(DiagnosticLevel::Warn, Diagnostic::new("a"));
        sink.log(DiagnosticLevel::Error, Diagnostic::new("b"));
        sink.log(DiagnosticLevel::Warn, Diagnostic::new("c"));
        assert_eq!(sink.count(DiagnosticLevel::Warn), 2);
        assert_eq!(sink.count(DiagnosticLevel::Error), 1);
        sink.clear();
        assert!(sink.entries().is_empty());
    }
}
