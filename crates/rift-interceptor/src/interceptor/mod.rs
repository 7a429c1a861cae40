//! Interceptors: handler registry, dispatch and lifecycle.
//!
//! An interceptor owns the handlers declared on it. Inbound requests addressed
//! to its base URL are dispatched to the most specific, most recently
//! registered eligible handler whose restrictions all pass. Requests no
//! handler accepts are resolved by the unhandled request strategy.
//!
//! # Module Structure
//!
//! - `core` - Shared state, dispatch and lifecycle
//! - `registry` - Handlers grouped by endpoint, in selection order
//! - `local` - `HttpInterceptor`
//! - `remote` - `RemoteHttpInterceptor`
//! - `types` - Errors and dispatch outcomes

mod core;
mod local;
mod registry;
mod remote;
mod types;


pub use local::HttpInterceptor;
pub use remote::RemoteHttpInterceptor;
pub use types::{InterceptorError, Resolution, UnhandledOutcome};
