//! # testledger-http
//!
//! Remote access layer for tabular documents.
//!
//! This crate turns ledger-level reads, writes and column insertions into
//! paced, retried remote calls:
//! - [`RemoteAccess`] keeps one [`Session`] per document and a sheet id cache
//! - [`Session`] spaces calls by the configured request duration and retries
//!   a failed call once after a fixed backoff
//! - [`SheetsRpc`] is the opaque remote procedure surface, implemented over
//!   HTTP by [`HttpSheetsRpc`] and in process by [`MemorySheets`]
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use testledger_core::Pacing;
//! use testledger_http::{MemorySheets, RemoteAccess};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sheets = Arc::new(MemorySheets::new());
//! sheets.add_sheet("doc", "Run1");
//! sheets.set_cell("doc", "Run1", "C", 5, "login");
//!
//! let access = RemoteAccess::in_memory(sheets, Pacing::none());
//! let rows = access.read_range("Run1", "C", 5, "C", 14, "doc").await;
//! assert_eq!(rows, Some(vec![vec!["login".to_string()]]));
//! # }
//! ```

/// Session registry and sheet id cache.
pub mod access;
/// reqwest-backed RPC.
pub mod client;
/// Credential providers.
pub mod credentials;
/// In-memory RPC.
pub mod memory;
/// Remote procedure trait and wire types.
pub mod rpc;
/// Sessions, connectors, pacing and retry.
pub mod session;

pub use access::RemoteAccess;
pub use client::HttpSheetsRpc;
pub use credentials::{
    AccessToken, CredentialProvider, FileCredentialProvider, StaticCredentialProvider,
};
pub use memory::{CallKind, MemorySheets, RecordedCall, MAX_RECORDED_CALLS};
pub use rpc::{CellMatrix, SheetProperties, SheetsRpc, StructuralOp, ValueInput, ValueRender};
pub use session::{Connector, HttpConnector, Session, SharedConnector};
