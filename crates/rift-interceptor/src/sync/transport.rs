//! Transport to the remote mock process, and an in-memory implementation.

use super::operation::{Declaration, OperationKind, SyncOperation};
use crate::predicate::PathPattern;
use crate::request::{parse_absolute_url, HttpMethod};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Remote rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },
    #[error("Connection to the remote process was lost")]
    Disconnected,
    #[error("Interceptor is not connected to the remote process")]
    NotConnected,
}

/// Delivers operations to the remote mock process.
///
/// `send` resolves once the remote side acknowledged the operation. Timeouts,
/// if any, are the transport's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, operation: SyncOperation) -> Result<(), SyncError>;
}

/// A handler as the remote process knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHandlerEntry {
    pub handler_id: Uuid,
    pub method: HttpMethod,
    pub path: String,
    /// Declarations applied since the last clear, in order
    pub declarations: Vec<Declaration>,
}

impl RemoteHandlerEntry {
    pub fn is_bypassed(&self) -> bool {
        let last_toggle = self
            .declarations
            .iter()
            .rev()
            .find(|d| matches!(d, Declaration::Bypass | Declaration::Respond { .. }));
        matches!(last_toggle, Some(Declaration::Bypass))
    }

    pub fn has_response(&self) -> bool {
        self.declarations
            .iter()
            .any(|d| matches!(d, Declaration::Respond { .. }))
    }
}

#[derive(Debug, Clone, Default)]
struct AttachedInterceptor {
    base_url: String,
    handlers: Vec<RemoteHandlerEntry>,
}

/// The remote process's view of attached interceptors and their handlers.
#[derive(Debug, Clone, Default)]
pub struct RemoteEndpointTable {
    interceptors: HashMap<Uuid, AttachedInterceptor>,
}

impl RemoteEndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation. Errors carry the rejection reason.
    pub fn apply(&mut self, operation: &SyncOperation) -> Result<(), String> {
        let id = operation.interceptor_id;
        match &operation.kind {
            OperationKind::Attach { base_url } => {
                self.interceptors.insert(
                    id,
                    AttachedInterceptor {
                        base_url: base_url.trim_end_matches('/').to_string(),
                        handlers: Vec::new(),
                    },
                );
                return Ok(());
            }
            OperationKind::Detach => {
                return match self.interceptors.remove(&id) {
                    Some(_) => Ok(()),
                    None => Err(format!("interceptor {id} is not attached")),
                };
            }
            _ => {}
        }

        let Some(interceptor) = self.interceptors.get_mut(&id) else {
            return Err(format!("interceptor {id} is not attached"));
        };
        match &operation.kind {
            OperationKind::Attach { .. } | OperationKind::Detach => {}
            OperationKind::Reset => interceptor.handlers.clear(),
            OperationKind::RegisterEndpoint {
                handler_id,
                method,
                path,
            } => {
                PathPattern::parse(path).map_err(|e| e.to_string())?;
                interceptor.handlers.push(RemoteHandlerEntry {
                    handler_id: *handler_id,
                    method: *method,
                    path: path.clone(),
                    declarations: Vec::new(),
                });
            }
            OperationKind::DeclareHandler {
                handler_id,
                declaration,
            } => {
                let Some(handler) = interceptor
                    .handlers
                    .iter_mut()
                    .find(|h| h.handler_id == *handler_id)
                else {
                    return Err(format!("handler {handler_id} is not registered"));
                };
                match declaration {
                    Declaration::Clear => handler.declarations.clear(),
                    other => handler.declarations.push(other.clone()),
                }
            }
        }
        Ok(())
    }

    pub fn is_attached(&self, interceptor_id: Uuid) -> bool {
        self.interceptors.contains_key(&interceptor_id)
    }

    pub fn attached_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Handlers of an interceptor, in registration order.
    pub fn handlers(&self, interceptor_id: Uuid) -> Vec<RemoteHandlerEntry> {
        self.interceptors
            .get(&interceptor_id)
            .map(|interceptor| interceptor.handlers.clone())
            .unwrap_or_default()
    }

    /// Whether some attached interceptor has an eligible handler for the
    /// request's endpoint.
    pub fn handles(&self, method: HttpMethod, url: &str) -> bool {
        let Ok(uri) = parse_absolute_url(url) else {
            return false;
        };
        let target = format!(
            "{}://{}{}",
            uri.scheme_str().unwrap_or_default(),
            uri.authority().map(|a| a.as_str()).unwrap_or_default(),
            uri.path()
        );

        self.interceptors.values().any(|interceptor| {
            let Some(rest) = target.strip_prefix(&interceptor.base_url) else {
                return false;
            };
            let rest = match rest {
                "" => "/",
                rest if rest.starts_with('/') => rest,
                _ => return false,
            };
            interceptor.handlers.iter().any(|handler| {
                handler.method == method
                    && handler.has_response()
                    && !handler.is_bypassed()
                    && PathPattern::parse(&handler.path)
                        .map(|pattern| pattern.matches(rest).is_some())
                        .unwrap_or(false)
            })
        })
    }
}

#[derive(Default)]
struct InMemoryState {
    table: RemoteEndpointTable,
    operations: Vec<SyncOperation>,
    rejection: Option<String>,
}

/// Transport applying operations to an in-process [`RemoteEndpointTable`].
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryState>>,
    latency: Option<Duration>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every acknowledgement.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Reject every following operation with `reason`.
    pub fn reject_all(&self, reason: impl Into<String>) {
        self.state.lock().rejection = Some(reason.into());
    }

    pub fn accept_all(&self) {
        self.state.lock().rejection = None;
    }

    /// Acknowledged operations, in the order they were applied.
    pub fn operations(&self) -> Vec<SyncOperation> {
        self.state.lock().operations.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().operations.len()
    }

    pub fn table(&self) -> RemoteEndpointTable {
        self.state.lock().table.clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, operation: SyncOperation) -> Result<(), SyncError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        let rejected = |reason: String| SyncError::Rejected {
            operation: operation.describe(),
            reason,
        };
        if let Some(reason) = state.rejection.clone() {
            return Err(rejected(reason));
        }
        state.table.apply(&operation).map_err(rejected)?;
        debug!("Remote applied {}", operation.describe());
        state.operations.push(operation);
        Ok(())
    }
}
