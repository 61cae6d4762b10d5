//! The remote tabular-document procedures the access layer is built on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use testledger_core::{CellRange, LedgerResult};

/// Rows of cells, each cell rendered as text. Empty cells are `""`.
///
/// Like the remote store, backends omit trailing empty rows and trailing
/// empty cells within a row, so rows may be shorter than the range.
pub type CellMatrix = Vec<Vec<String>>;

/// How cell contents are rendered on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueRender {
    /// Displayed values, formulas evaluated.
    #[default]
    Formatted,
    /// Formulas as typed (`=SUM(E5:E100)`), other cells as their values.
    Formula,
}

impl ValueRender {
    pub fn as_api_str(self) -> &'static str {
        match self {
            ValueRender::Formatted => "FORMATTED_VALUE",
            ValueRender::Formula => "FORMULA",
        }
    }
}

/// How written values are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueInput {
    /// Parsed as if typed by a user: formulas and numbers are recognized.
    #[default]
    UserEntered,
    /// Stored verbatim as strings.
    Raw,
}

impl ValueInput {
    pub fn as_api_str(self) -> &'static str {
        match self {
            ValueInput::UserEntered => "USER_ENTERED",
            ValueInput::Raw => "RAW",
        }
    }
}

/// Identity of one sheet in a document's metadata listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

/// Structural edits sent through a batch update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralOp {
    /// Insert `count` columns before the 0-based `start_index`.
    InsertColumns {
        sheet_id: i64,
        start_index: usize,
        count: usize,
        inherit_from_before: bool,
    },
}

/// Opaque remote procedures of a tabular-document service.
///
/// Implementations perform exactly one attempt per call; pacing and retry
/// belong to [`crate::Session`].
#[async_trait]
pub trait SheetsRpc: Send + Sync {
    /// Read the cells of `range`.
    async fn get_range(
        &self,
        document_id: &str,
        range: &CellRange,
        render: ValueRender,
    ) -> LedgerResult<CellMatrix>;

    /// Write `values` into `range`, row-major.
    async fn set_range(
        &self,
        document_id: &str,
        range: &CellRange,
        values: CellMatrix,
        input: ValueInput,
    ) -> LedgerResult<()>;

    /// List every sheet of the document.
    async fn get_metadata(&self, document_id: &str) -> LedgerResult<Vec<SheetProperties>>;

    /// Apply structural edits in order.
    async fn batch_update(&self, document_id: &str, ops: Vec<StructuralOp>) -> LedgerResult<()>;
}
