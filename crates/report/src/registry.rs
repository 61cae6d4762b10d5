//! Per-document ledger registry.

use crate::layout::ReportLayout;
use crate::ledger::Ledger;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use testledger_core::Config;
use testledger_http::RemoteAccess;

/// One [`Ledger`] per document identifier, all sharing one [`RemoteAccess`].
pub struct Reports {
    access: Arc<RemoteAccess>,
    layout: ReportLayout,
    ledgers: Mutex<HashMap<String, Arc<Ledger>>>,
}

impl Reports {
    pub fn new(access: Arc<RemoteAccess>, layout: ReportLayout) -> Self {
        Self {
            access,
            layout,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// Ledgers reached over HTTP with the credentials named in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(RemoteAccess::from_config(config)),
            ReportLayout::default(),
        )
    }

    pub fn access(&self) -> &Arc<RemoteAccess> {
        &self.access
    }

    /// The ledger of `document_id`, created on first use.
    pub fn ledger(&self, document_id: &str) -> Arc<Ledger> {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        let ledger = ledgers.entry(document_id.to_string()).or_insert_with(|| {
            Arc::new(Ledger::new(document_id, Arc::clone(&self.access), self.layout))
        });
        Arc::clone(ledger)
    }

    pub async fn find_test_by_name(
        &self,
        test_name: &str,
        sheet: &str,
        allow_existing_result: bool,
        document_id: &str,
    ) -> Option<u32> {
        self.ledger(document_id)
            .find_test_by_name(test_name, sheet, allow_existing_result)
            .await
    }

    pub async fn update_test_result_by_name(
        &self,
        test_name: &str,
        test_result: &str,
        sheet: &str,
        overwrite: bool,
        document_id: &str,
    ) -> Option<u32> {
        self.ledger(document_id)
            .update_test_result_by_name(test_name, test_result, sheet, overwrite)
            .await
    }

    pub async fn create_new_result_col(&self, sheet: &str, document_id: &str) -> Option<()> {
        self.ledger(document_id).create_new_result_col(sheet).await
    }
}
