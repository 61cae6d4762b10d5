//! Per-document session registry and the sheet id cache.

use crate::credentials::FileCredentialProvider;
use crate::memory::MemorySheets;
use crate::rpc::{CellMatrix, ValueRender};
use crate::session::{Connector, HttpConnector, Session, SharedConnector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use testledger_core::{CellRange, Config, LedgerError, LedgerResult, Pacing};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Entry point of the remote access layer.
///
/// Holds at most one [`Session`] per document identifier, created on first
/// use and kept for the lifetime of this value. Concurrent first access to the
/// same identifier constructs a single session; a failed construction is not
/// cached and is attempted again on the next call.
///
/// Operations never return errors: a call that still fails after its retry,
/// a session that cannot be established or a sheet that cannot be resolved
/// is logged and yields `None`.
pub struct RemoteAccess {
    connector: Arc<dyn Connector>,
    pacing: Pacing,
    sessions: Mutex<HashMap<String, Arc<OnceCell<Arc<Session>>>>>,
    /// (document id, sheet name) -> sheet id. Never invalidated.
    sheet_ids: RwLock<HashMap<(String, String), i64>>,
}

impl RemoteAccess {
    pub fn new(connector: Arc<dyn Connector>, pacing: Pacing) -> Self {
        Self {
            connector,
            pacing,
            sessions: Mutex::new(HashMap::new()),
            sheet_ids: RwLock::new(HashMap::new()),
        }
    }

    /// HTTP sessions authenticated from the credential files named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let credentials = Arc::new(FileCredentialProvider::from_config(config));
        let connector = HttpConnector::new(config.api_base_url.clone(), credentials);
        Self::new(Arc::new(connector), config.pacing)
    }

    /// Sessions backed by an in-memory store.
    pub fn in_memory(sheets: Arc<MemorySheets>, pacing: Pacing) -> Self {
        Self::new(Arc::new(SharedConnector::new(sheets)), pacing)
    }

    /// The session for `document_id`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Session` if the connector fails.
    pub async fn get_session(&self, document_id: &str) -> LedgerResult<Arc<Session>> {
        let cell = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(sessions.entry(document_id.to_string()).or_default())
        };

        let session = cell
            .get_or_try_init(|| async {
                let rpc = self
                    .connector
                    .connect(document_id)
                    .await
                    .map_err(|e| LedgerError::session(document_id, e.to_string()))?;
                info!(document_id, "session established");
                Ok::<_, LedgerError>(Arc::new(Session::new(document_id, rpc, self.pacing)))
            })
            .await?;

        Ok(Arc::clone(session))
    }

    async fn session_or_log(&self, document_id: &str) -> Option<Arc<Session>> {
        match self.get_session(document_id).await {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(document_id, error = %err, "no session");
                None
            }
        }
    }

    /// Read `sheet!{start_col}{start_row}:{end_col}{end_row}` as displayed values.
    pub async fn read_range(
        &self,
        sheet: &str,
        start_col: &str,
        start_row: u32,
        end_col: &str,
        end_row: u32,
        document_id: &str,
    ) -> Option<CellMatrix> {
        let range = CellRange::new(sheet, start_col, start_row, end_col, end_row);
        self.read_range_as(&range, ValueRender::Formatted, document_id)
            .await
    }

    /// Read a range with an explicit render mode.
    pub async fn read_range_as(
        &self,
        range: &CellRange,
        render: ValueRender,
        document_id: &str,
    ) -> Option<CellMatrix> {
        self.session_or_log(document_id)
            .await?
            .read_range(range, render)
            .await
    }

    /// Write one value into the first cell of `range`.
    pub async fn write_value(&self, value: &str, range: &CellRange, document_id: &str) -> Option<()> {
        self.write_values(vec![vec![value.to_string()]], range, document_id)
            .await
    }

    /// Write a row-major matrix into `range`.
    pub async fn write_values(
        &self,
        values: CellMatrix,
        range: &CellRange,
        document_id: &str,
    ) -> Option<()> {
        self.session_or_log(document_id)
            .await?
            .write_values(values, range)
            .await
    }

    /// Insert one empty column before the 0-based `column_index` of `sheet`.
    pub async fn insert_column(&self, column_index: usize, sheet: &str, document_id: &str) -> Option<()> {
        let session = self.session_or_log(document_id).await?;
        let Some(sheet_id) = self.resolve_sheet_id(&session, sheet).await else {
            let err = LedgerError::resolution(document_id, sheet);
            warn!(document_id, error = %err, "column not inserted");
            return None;
        };
        session.insert_column(sheet_id, column_index).await
    }

    /// Sheet id already known for `sheet`, without any remote call.
    pub fn cached_sheet_id(&self, document_id: &str, sheet: &str) -> Option<i64> {
        self.sheet_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(document_id.to_string(), sheet.to_string()))
            .copied()
    }

    async fn resolve_sheet_id(&self, session: &Session, sheet: &str) -> Option<i64> {
        let document_id = session.document_id();
        if let Some(id) = self.cached_sheet_id(document_id, sheet) {
            return Some(id);
        }

        let listing = session.list_sheets().await?;
        let mut sheet_ids = self.sheet_ids.write().unwrap_or_else(PoisonError::into_inner);
        for properties in listing {
            sheet_ids.insert(
                (document_id.to_string(), properties.title),
                properties.sheet_id,
            );
        }
        sheet_ids
            .get(&(document_id.to_string(), sheet.to_string()))
            .copied()
    }
}
