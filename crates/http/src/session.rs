//! Authenticated sessions and the pacing/retry policy applied to every call.

use crate::client::HttpSheetsRpc;
use crate::credentials::CredentialProvider;
use crate::rpc::{CellMatrix, SheetProperties, SheetsRpc, StructuralOp, ValueInput, ValueRender};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use testledger_core::{CellRange, LedgerResult, Pacing};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Produces the RPC handle for a new session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticate and connect to `document_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if credential material cannot be obtained or the
    /// handle cannot be built. Nothing is cached on failure.
    async fn connect(&self, document_id: &str) -> LedgerResult<Arc<dyn SheetsRpc>>;
}

/// Connects through the HTTP API with tokens from a [`CredentialProvider`].
pub struct HttpConnector {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpConnector {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, document_id: &str) -> LedgerResult<Arc<dyn SheetsRpc>> {
        // Fail the session up front when no token can be had at all.
        self.credentials.access_token().await?;
        debug!(document_id, base_url = %self.base_url, "connecting");
        Ok(Arc::new(HttpSheetsRpc::new(
            &self.base_url,
            Arc::clone(&self.credentials),
        )?))
    }
}

/// Hands the same backend to every session, e.g. a [`crate::MemorySheets`].
pub struct SharedConnector {
    rpc: Arc<dyn SheetsRpc>,
}

impl SharedConnector {
    pub fn new(rpc: Arc<dyn SheetsRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Connector for SharedConnector {
    async fn connect(&self, _document_id: &str) -> LedgerResult<Arc<dyn SheetsRpc>> {
        Ok(Arc::clone(&self.rpc))
    }
}

/// One authenticated handle to one document.
///
/// Every call is paced: when a call returns before `pacing.request_duration`
/// has passed since it started, the session sleeps the remainder, so the next
/// call on this session starts no earlier than that. A failed call is retried
/// once after `pacing.sleep_on_error`; if the retry fails too the operation
/// returns `None` and the failure is only logged.
pub struct Session {
    document_id: String,
    rpc: Arc<dyn SheetsRpc>,
    pacing: Pacing,
}

impl Session {
    pub fn new(document_id: impl Into<String>, rpc: Arc<dyn SheetsRpc>, pacing: Pacing) -> Self {
        Self {
            document_id: document_id.into(),
            rpc,
            pacing,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub async fn read_range(&self, range: &CellRange, render: ValueRender) -> Option<CellMatrix> {
        let rpc = &self.rpc;
        let document_id = self.document_id.as_str();
        self.call("read range", range, move || {
            rpc.get_range(document_id, range, render)
        })
        .await
    }

    /// Write a matrix with user-entered interpretation.
    pub async fn write_values(&self, values: CellMatrix, range: &CellRange) -> Option<()> {
        let rpc = &self.rpc;
        let document_id = self.document_id.as_str();
        let values = &values;
        self.call("write values", range, move || {
            rpc.set_range(document_id, range, values.clone(), ValueInput::UserEntered)
        })
        .await
    }

    pub async fn list_sheets(&self) -> Option<Vec<SheetProperties>> {
        let rpc = &self.rpc;
        let document_id = self.document_id.as_str();
        self.call("list sheets", &"metadata", move || rpc.get_metadata(document_id))
            .await
    }

    /// Insert one column before the 0-based `column_index`, without
    /// inheriting formatting from the column to its left.
    pub async fn insert_column(&self, sheet_id: i64, column_index: usize) -> Option<()> {
        let rpc = &self.rpc;
        let document_id = self.document_id.as_str();
        let target = format!("sheet {sheet_id} column {column_index}");
        self.call("insert column", &target, move || {
            rpc.batch_update(
                document_id,
                vec![StructuralOp::InsertColumns {
                    sheet_id,
                    start_index: column_index,
                    count: 1,
                    inherit_from_before: false,
                }],
            )
        })
        .await
    }

    /// Run `op` paced, retrying it once after the error backoff.
    async fn call<T, F, Fut>(&self, operation: &str, target: &(dyn Display + Sync), op: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        match self.paced(op()).await {
            Ok(value) => return Some(value),
            Err(err) => warn!(
                document_id = %self.document_id,
                operation,
                %target,
                error = %err,
                "remote call failed, retrying in {:?}",
                self.pacing.sleep_on_error
            ),
        }

        sleep(self.pacing.sleep_on_error).await;

        match self.paced(op()).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    document_id = %self.document_id,
                    operation,
                    %target,
                    error = %err,
                    "remote call failed after retry, giving up"
                );
                None
            }
        }
    }

    async fn paced<T>(&self, fut: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        let started = Instant::now();
        let result = fut.await;
        if let Some(remaining) = self.pacing.request_duration.checked_sub(started.elapsed()) {
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
        }
        result
    }
}
