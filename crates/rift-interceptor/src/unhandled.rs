//! Unhandled request strategies and their process-wide defaults.
//!
//! When no handler matches a request addressed to a running interceptor, the
//! strategy decides whether the request passes through to the real network
//! (`bypass`, local interceptors only) or is rejected, and whether it is logged.
//!
//! Defaults are process-wide state. Tests that change them are expected to
//! call [`reset_defaults`] when they are done.

use crate::diagnostics::{Diagnostic, DiagnosticLevel, DiagnosticsSink};
use crate::request::InterceptedRequest;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnhandledAction {
    /// Let the request continue to its original destination
    Bypass,
    /// Fail the request
    Reject,
}

/// Declared strategy: an action plus whether to log the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnhandledDeclaration {
    pub action: UnhandledAction,
    /// `None` takes the flag of the process-wide default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<bool>,
}

impl UnhandledDeclaration {
    pub fn bypass() -> Self {
        Self {
            action: UnhandledAction::Bypass,
            log: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            action: UnhandledAction::Reject,
            log: None,
        }
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = Some(log);
        self
    }

    pub fn should_log(&self) -> bool {
        self.log.unwrap_or(true)
    }
}

type StrategyFuture = BoxFuture<'static, anyhow::Result<UnhandledDeclaration>>;
type StrategyFactory = dyn Fn(InterceptedRequest) -> StrategyFuture + Send + Sync;

/// A declaration, or a factory computing one per request.
#[derive(Clone)]
pub enum UnhandledRequestStrategy {
    Declared(UnhandledDeclaration),
    Factory(Arc<StrategyFactory>),
}

impl UnhandledRequestStrategy {
    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: Fn(InterceptedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<UnhandledDeclaration>> + Send + 'static,
    {
        UnhandledRequestStrategy::Factory(Arc::new(move |request| Box::pin(factory(request))))
    }

    /// Resolve the declaration for a request, awaiting the factory if needed.
    pub async fn resolve(
        &self,
        request: &InterceptedRequest,
    ) -> anyhow::Result<UnhandledDeclaration> {
        match self {
            UnhandledRequestStrategy::Declared(declaration) => Ok(*declaration),
            UnhandledRequestStrategy::Factory(factory) => factory(request.clone()).await,
        }
    }
}

impl From<UnhandledDeclaration> for UnhandledRequestStrategy {
    fn from(declaration: UnhandledDeclaration) -> Self {
        UnhandledRequestStrategy::Declared(declaration)
    }
}

impl fmt::Debug for UnhandledRequestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnhandledRequestStrategy::Declared(declaration) => {
                f.debug_tuple("Declared").field(declaration).finish()
            }
            UnhandledRequestStrategy::Factory(_) => f.write_str("Factory(<fn>)"),
        }
    }
}

/// Which kind of interceptor a strategy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorKind {
    Local,
    Remote,
}

struct Defaults {
    local: UnhandledRequestStrategy,
    remote: UnhandledRequestStrategy,
}

impl Defaults {
    fn initial() -> Self {
        Self {
            local: UnhandledDeclaration::bypass().log(true).into(),
            remote: UnhandledDeclaration::reject().log(true).into(),
        }
    }
}

static DEFAULTS: Lazy<RwLock<Defaults>> = Lazy::new(|| RwLock::new(Defaults::initial()));

/// Current process-wide default for a kind of interceptor.
pub fn default_strategy(kind: InterceptorKind) -> UnhandledRequestStrategy {
    let defaults = DEFAULTS.read();
    match kind {
        InterceptorKind::Local => defaults.local.clone(),
        InterceptorKind::Remote => defaults.remote.clone(),
    }
}

/// Override the process-wide default for a kind of interceptor.
pub fn set_default_strategy(kind: InterceptorKind, strategy: impl Into<UnhandledRequestStrategy>) {
    let mut defaults = DEFAULTS.write();
    match kind {
        InterceptorKind::Local => defaults.local = strategy.into(),
        InterceptorKind::Remote => defaults.remote = strategy.into(),
    }
}

/// Restore the initial defaults: local `bypass`, remote `reject`, both logged.
pub fn reset_defaults() {
    *DEFAULTS.write() = Defaults::initial();
}

/// Built-in declaration, used when no strategy can be resolved.
pub(crate) fn builtin_declaration(kind: InterceptorKind) -> UnhandledDeclaration {
    match kind {
        InterceptorKind::Local => UnhandledDeclaration::bypass().log(true),
        InterceptorKind::Remote => UnhandledDeclaration::reject().log(true),
    }
}

/// Resolve the declaration for an unhandled request.
///
/// The interceptor's own strategy wins over the process-wide default. A
/// failing factory is reported to the sink and degrades to the default, then
/// to the built-in declaration. A declaration leaving `log` unset takes it
/// from the default. Remote interceptors never bypass.
pub(crate) async fn resolve_declaration(
    kind: InterceptorKind,
    strategy: Option<&UnhandledRequestStrategy>,
    request: &InterceptedRequest,
    sink: &dyn DiagnosticsSink,
) -> UnhandledDeclaration {
    let own = match strategy {
        Some(strategy) => resolve_reported(strategy, request, sink).await,
        None => None,
    };

    let declaration = match own {
        Some(declaration) if declaration.log.is_some() => declaration,
        own => {
            let default = resolve_reported(&default_strategy(kind), request, sink)
                .await
                .unwrap_or_else(|| builtin_declaration(kind));
            let mut declaration = own.unwrap_or(default);
            declaration.log = Some(declaration.log.or(default.log).unwrap_or(true));
            declaration
        }
    };

    if kind == InterceptorKind::Remote && declaration.action == UnhandledAction::Bypass {
        warn!(
            "Remote interceptors cannot bypass unhandled requests; rejecting {} {}",
            request.method, request.url
        );
        return UnhandledDeclaration {
            action: UnhandledAction::Reject,
            log: declaration.log,
        };
    }
    declaration
}

async fn resolve_reported(
    strategy: &UnhandledRequestStrategy,
    request: &InterceptedRequest,
    sink: &dyn DiagnosticsSink,
) -> Option<UnhandledDeclaration> {
    match strategy.resolve(request).await {
        Ok(declaration) => Some(declaration),
        Err(e) => {
            sink.log(
                DiagnosticLevel::Error,
                Diagnostic::new(format!("Unhandled request strategy failed: {e:#}"))
                    .with_request(request),
            );
            None
        }
    }
}
