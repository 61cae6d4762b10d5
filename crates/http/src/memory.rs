//! In-process implementation of [`SheetsRpc`].
//!
//! Cells are stored as the text that was written; formulas are kept but never
//! evaluated, so both render modes return the stored text. Reads drop trailing
//! empty rows and cells the same way the remote store does, which the ledger
//! scan relies on. Failures can be injected to exercise the retry path.
//!
//! Calls are counted per kind for the lifetime of the store, but only the most
//! recent [`MAX_RECORDED_CALLS`] are kept with their start instants, so a long
//! dry run does not grow the log without bound.

use crate::rpc::{CellMatrix, SheetProperties, SheetsRpc, StructuralOp, ValueInput, ValueRender};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use testledger_core::{column_letters_to_index, CellRange, LedgerError, LedgerResult};
use tokio::time::Instant;

/// Calls kept in the log returned by [`MemorySheets::calls`].
pub const MAX_RECORDED_CALLS: usize = 1024;

/// Which procedure a recorded call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetRange,
    SetRange,
    GetMetadata,
    BatchUpdate,
}

/// One call received by the backend, failed or not.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub started: Instant,
}

#[derive(Debug)]
struct MemorySheet {
    id: i64,
    title: String,
    /// `cells[row][col]`, both 0-based.
    cells: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, Vec<MemorySheet>>,
    next_sheet_id: i64,
    pending_successes: usize,
    pending_failures: usize,
    calls: VecDeque<RecordedCall>,
    call_counts: HashMap<CallKind, usize>,
}

impl MemoryState {
    /// Record a call and consume one injected outcome if any are pending.
    fn begin(&mut self, kind: CallKind) -> LedgerResult<()> {
        if self.calls.len() == MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(RecordedCall {
            kind,
            started: Instant::now(),
        });
        *self.call_counts.entry(kind).or_default() += 1;
        if self.pending_successes > 0 {
            self.pending_successes -= 1;
            return Ok(());
        }
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(LedgerError::Remote(format!(
                "injected failure on {kind:?}"
            )));
        }
        Ok(())
    }

    fn sheet(&self, document_id: &str, title: &str) -> LedgerResult<&MemorySheet> {
        self.documents
            .get(document_id)
            .and_then(|sheets| sheets.iter().find(|s| s.title == title))
            .ok_or_else(|| LedgerError::Remote(format!("Unable to parse range: {title}")))
    }

    fn sheet_mut(&mut self, document_id: &str, title: &str) -> LedgerResult<&mut MemorySheet> {
        self.documents
            .get_mut(document_id)
            .and_then(|sheets| sheets.iter_mut().find(|s| s.title == title))
            .ok_or_else(|| LedgerError::Remote(format!("Unable to parse range: {title}")))
    }
}

/// In-memory tabular documents.
#[derive(Debug, Default)]
pub struct MemorySheets {
    state: Mutex<MemoryState>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an empty sheet to a document, creating the document if needed.
    /// Returns the new sheet id.
    pub fn add_sheet(&self, document_id: &str, title: &str) -> i64 {
        let mut state = self.lock();
        state.next_sheet_id += 1;
        let id = state.next_sheet_id * 1000;
        state
            .documents
            .entry(document_id.to_string())
            .or_default()
            .push(MemorySheet {
                id,
                title: title.to_string(),
                cells: Vec::new(),
            });
        id
    }

    /// Set one cell, `row` 1-based. The sheet must exist.
    pub fn set_cell(&self, document_id: &str, sheet: &str, col: &str, row: u32, value: &str) {
        let Ok(col) = column_letters_to_index(col) else {
            return;
        };
        if row == 0 {
            return;
        }
        let mut state = self.lock();
        if let Ok(sheet) = state.sheet_mut(document_id, sheet) {
            put(&mut sheet.cells, row as usize - 1, col, value.to_string());
        }
    }

    /// Fill a column downwards from `start_row`; `""` leaves a blank cell.
    pub fn set_column(&self, document_id: &str, sheet: &str, col: &str, start_row: u32, values: &[&str]) {
        for (offset, value) in values.iter().enumerate() {
            self.set_cell(document_id, sheet, col, start_row + offset as u32, value);
        }
    }

    /// Text of one cell, `""` when empty or out of bounds.
    pub fn cell(&self, document_id: &str, sheet: &str, col: &str, row: u32) -> String {
        let Ok(col) = column_letters_to_index(col) else {
            return String::new();
        };
        if row == 0 {
            return String::new();
        }
        let state = self.lock();
        state
            .sheet(document_id, sheet)
            .ok()
            .and_then(|sheet| sheet.cells.get(row as usize - 1))
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next `count` calls fail with a remote error.
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Let `successes` calls through, then fail the `failures` after them.
    pub fn fail_after(&self, successes: usize, failures: usize) {
        let mut state = self.lock();
        state.pending_successes = successes;
        state.pending_failures = failures;
    }

    /// The most recent calls, oldest first, at most [`MAX_RECORDED_CALLS`].
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Number of calls of one kind received so far.
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.lock().call_counts.get(&kind).copied().unwrap_or(0)
    }
}

fn put(cells: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) {
    if cells.len() <= row {
        cells.resize_with(row + 1, Vec::new);
    }
    let cells_row = &mut cells[row];
    if cells_row.len() <= col {
        cells_row.resize(col + 1, String::new());
    }
    cells_row[col] = value;
}

fn range_bounds(range: &CellRange) -> LedgerResult<(usize, usize, usize, usize)> {
    if range.start_row == 0 || range.end_row < range.start_row {
        return Err(LedgerError::InvalidRange(range.to_string()));
    }
    let start_col = column_letters_to_index(&range.start_col)?;
    let end_col = column_letters_to_index(&range.end_col)?;
    if end_col < start_col {
        return Err(LedgerError::InvalidRange(range.to_string()));
    }
    Ok((
        range.start_row as usize - 1,
        range.end_row as usize - 1,
        start_col,
        end_col,
    ))
}

#[async_trait]
impl SheetsRpc for MemorySheets {
    async fn get_range(
        &self,
        document_id: &str,
        range: &CellRange,
        _render: ValueRender,
    ) -> LedgerResult<CellMatrix> {
        let mut state = self.lock();
        state.begin(CallKind::GetRange)?;
        let (start_row, end_row, start_col, end_col) = range_bounds(range)?;
        let sheet = state.sheet(document_id, &range.sheet)?;

        let mut rows: CellMatrix = (start_row..=end_row)
            .map(|row| {
                let mut values: Vec<String> = (start_col..=end_col)
                    .map(|col| {
                        sheet
                            .cells
                            .get(row)
                            .and_then(|r| r.get(col))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                while values.last().is_some_and(String::is_empty) {
                    values.pop();
                }
                values
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn set_range(
        &self,
        document_id: &str,
        range: &CellRange,
        values: CellMatrix,
        _input: ValueInput,
    ) -> LedgerResult<()> {
        let mut state = self.lock();
        state.begin(CallKind::SetRange)?;
        let (start_row, end_row, start_col, end_col) = range_bounds(range)?;
        let sheet = state.sheet_mut(document_id, &range.sheet)?;

        for (r, row_values) in values.into_iter().enumerate() {
            if start_row + r > end_row {
                return Err(LedgerError::InvalidRange(format!(
                    "{range}: more rows than the range holds"
                )));
            }
            for (c, value) in row_values.into_iter().enumerate() {
                if start_col + c > end_col {
                    return Err(LedgerError::InvalidRange(format!(
                        "{range}: more columns than the range holds"
                    )));
                }
                put(&mut sheet.cells, start_row + r, start_col + c, value);
            }
        }
        Ok(())
    }

    async fn get_metadata(&self, document_id: &str) -> LedgerResult<Vec<SheetProperties>> {
        let mut state = self.lock();
        state.begin(CallKind::GetMetadata)?;
        let sheets = state
            .documents
            .get(document_id)
            .ok_or_else(|| LedgerError::Remote(format!("Requested entity was not found: {document_id}")))?;

        Ok(sheets
            .iter()
            .map(|s| SheetProperties {
                sheet_id: s.id,
                title: s.title.clone(),
            })
            .collect())
    }

    async fn batch_update(&self, document_id: &str, ops: Vec<StructuralOp>) -> LedgerResult<()> {
        let mut state = self.lock();
        state.begin(CallKind::BatchUpdate)?;

        for op in ops {
            match op {
                StructuralOp::InsertColumns {
                    sheet_id,
                    start_index,
                    count,
                    ..
                } => {
                    let sheet = state
                        .documents
                        .get_mut(document_id)
                        .and_then(|sheets| sheets.iter_mut().find(|s| s.id == sheet_id))
                        .ok_or_else(|| LedgerError::Remote(format!("No grid with id: {sheet_id}")))?;
                    for row in &mut sheet.cells {
                        if row.len() > start_index {
                            row.splice(
                                start_index..start_index,
                                std::iter::repeat(String::new()).take(count),
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
