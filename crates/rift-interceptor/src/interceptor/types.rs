//! Error and outcome types for interceptors.

use crate::config::ConfigError;
use crate::handler::TimesCheckFailure;
use crate::predicate::PathPatternError;
use crate::request::HttpMethod;
use crate::response::MockResponse;
use crate::sync::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum InterceptorError {
    #[error("Interceptor is not running. Did you forget to start it?")]
    NotStarted,
    #[error("Interceptor is already running")]
    AlreadyRunning,
    #[error("Interceptor is not running")]
    NotRunning,
    #[error("{0}")]
    TimesCheckFailed(TimesCheckFailure),
    #[error("Unhandled request rejected: {method} {url}")]
    UnhandledRequestRejected { method: HttpMethod, url: String },
    #[error("Remote synchronization failed: {0}")]
    SyncFailed(SyncError),
    #[error("Response of handler {method} {path} failed: {source:#}")]
    ResponseFailed {
        method: HttpMethod,
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    InvalidPath(#[from] PathPatternError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<SyncError> for InterceptorError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::NotConnected => InterceptorError::NotStarted,
            other => InterceptorError::SyncFailed(other),
        }
    }
}

/// What happens to a request no handler matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnhandledOutcome {
    /// Let the request through unmodified
    Bypass,
    /// Fail the request
    Reject { method: HttpMethod, url: String },
}

/// Result of dispatching a request to an interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A handler matched and produced this response
    Handled(MockResponse),
    /// No handler matched
    Unhandled(UnhandledOutcome),
    /// The request is not addressed to this interceptor (base URL mismatch)
    Ignored,
}

impl Resolution {
    pub fn is_handled(&self) -> bool {
        matches!(self, Resolution::Handled(_))
    }

    pub fn response(&self) -> Option<&MockResponse> {
        match self {
            Resolution::Handled(response) => Some(response),
            _ => None,
        }
    }

    /// Response to return to the caller, `None` to let the request through,
    /// or an error for rejected requests.
    pub fn into_response(self) -> Result<Option<MockResponse>, InterceptorError> {
        match self {
            Resolution::Handled(response) => Ok(Some(response)),
            Resolution::Unhandled(UnhandledOutcome::Bypass) | Resolution::Ignored => Ok(None),
            Resolution::Unhandled(UnhandledOutcome::Reject { method, url }) => {
                Err(InterceptorError::UnhandledRequestRejected { method, url })
            }
        }
    }
}
