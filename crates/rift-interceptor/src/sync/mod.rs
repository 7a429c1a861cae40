//! Synchronization of remote interceptors with the mock process.
//!
//! # Module Structure
//!
//! - `operation` - Operations and their wire format
//! - `transport` - `Transport` trait, in-memory transport and endpoint table
//! - `channel` - Ordered delivery through a worker task
//! - `handler` - `RemoteRequestHandler` and its synced view

mod channel;
mod handler;
mod operation;
mod transport;

pub(crate) use channel::SyncChannel;
pub use handler::{RemoteRequestHandler, SyncedRemoteRequestHandler};
pub use operation::{Declaration, OperationKind, SyncOperation};
pub use transport::{
    InMemoryTransport, RemoteEndpointTable, RemoteHandlerEntry, SyncError, Transport,
};
