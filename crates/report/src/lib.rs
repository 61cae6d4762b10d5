//! # testledger-report
//!
//! A test-result ledger kept in a remote tabular document.
//!
//! Each sheet holds test names in one column and results in another. Test
//! runners look up the row of a test by name, record a result in place or on
//! a new row, and start a fresh timestamped result column per run.
//!
//! The free functions in this crate go through a process-wide [`Reports`]
//! registry. Install one with [`install`] to choose the backend; otherwise the
//! first call builds an HTTP-backed registry from [`Config::current`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use testledger_core::Pacing;
//! use testledger_http::{MemorySheets, RemoteAccess};
//! use testledger_report::{ReportLayout, Reports};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sheets = Arc::new(MemorySheets::new());
//! sheets.add_sheet("doc", "Run1");
//! sheets.set_column("doc", "Run1", "C", 5, &["login", "", "logout"]);
//!
//! let access = Arc::new(RemoteAccess::in_memory(sheets, Pacing::none()));
//! let reports = Reports::new(access, ReportLayout::default());
//!
//! assert_eq!(reports.find_test_by_name("LOGIN", "Run1", true, "doc").await, Some(5));
//! assert_eq!(reports.find_test_by_name("missing", "Run1", true, "doc").await, None);
//! # }
//! ```

/// Sheet layout of a ledger.
pub mod layout;
/// Scan, upsert and result column versioning.
pub mod ledger;
/// Per-document ledger registry.
pub mod registry;

pub use layout::ReportLayout;
pub use ledger::{result_column_stamp, Ledger};
pub use registry::Reports;

use std::sync::OnceLock;
use testledger_core::{Config, LedgerError, LedgerResult};

static REPORTS: OnceLock<Reports> = OnceLock::new();

/// Install the process-wide registry.
///
/// # Errors
///
/// Returns `LedgerError::Config` if a registry is already in use.
pub fn install(reports: Reports) -> LedgerResult<()> {
    REPORTS
        .set(reports)
        .map_err(|_| LedgerError::Config("report registry already initialized".to_string()))
}

/// The process-wide registry.
pub fn reports() -> &'static Reports {
    REPORTS.get_or_init(|| Reports::from_config(&Config::current()))
}

/// Row of `test_name` in `sheet_name` of `document_id`, or `None` if not found.
///
/// See [`Ledger::find_test_by_name`].
pub async fn find_test_by_name(
    test_name: &str,
    sheet_name: &str,
    allow_existing_result: bool,
    document_id: &str,
) -> Option<u32> {
    reports()
        .find_test_by_name(test_name, sheet_name, allow_existing_result, document_id)
        .await
}

/// Record a result, updating the matching row or appending a new one.
///
/// See [`Ledger::update_test_result_by_name`].
pub async fn update_test_result_by_name(
    test_name: &str,
    test_result: &str,
    sheet_name: &str,
    overwrite: bool,
    document_id: &str,
) -> Option<u32> {
    reports()
        .update_test_result_by_name(test_name, test_result, sheet_name, overwrite, document_id)
        .await
}

/// Start a new timestamped result column.
///
/// See [`Ledger::create_new_result_col`].
pub async fn create_new_result_col(sheet_name: &str, document_id: &str) -> Option<()> {
    reports().create_new_result_col(sheet_name, document_id).await
}
