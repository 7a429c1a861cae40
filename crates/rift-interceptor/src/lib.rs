// Library exports for the Rift interceptor.
//
// Tests declare expected HTTP interactions on an interceptor, either in the same
// process (`HttpInterceptor`) or against a remote mock process reached over a
// transport (`RemoteHttpInterceptor`), and verify them afterwards.

// ===== Request/response model =====
pub mod request;
pub mod response;

// ===== Matching and handler lifecycle =====
pub mod handler;
pub mod interceptor;
pub mod predicate;
pub mod unhandled;

// ===== Remote synchronization =====
pub mod sync;

// ===== Ambient =====
pub mod config;
pub mod diagnostics;

pub use config::{InterceptorOptions, RequestSaving};
pub use diagnostics::{Diagnostic, DiagnosticLevel, DiagnosticsSink, MemorySink, TracingSink};
pub use handler::{InterceptedEntry, RequestHandler, TimesBudget};
pub use interceptor::{
    HttpInterceptor, InterceptorError, RemoteHttpInterceptor, Resolution, UnhandledOutcome,
};
pub use predicate::{Restriction, StaticRestriction};
pub use request::{Body, HttpMethod, InterceptedRequest};
pub use response::{MockResponse, ResponseProducer};
pub use sync::{
    InMemoryTransport, RemoteRequestHandler, SyncError, SyncedRemoteRequestHandler, Transport,
};
pub use unhandled::{
    InterceptorKind, UnhandledAction, UnhandledDeclaration, UnhandledRequestStrategy,
};
