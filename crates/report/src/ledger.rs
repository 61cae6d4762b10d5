//! Row lookup, upsert and result column versioning for one document.

use crate::layout::ReportLayout;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use testledger_core::CellRange;
use testledger_http::{CellMatrix, RemoteAccess, ValueRender};
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization as _;

/// Header written above a new result column, `YYYYMMDD-HHmmss`.
pub fn result_column_stamp(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// Base letters of `name`: compatibility-decomposed, accents dropped, case folded.
fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
}

/// Test names differing only by letter case or accents name the same test.
fn same_test(a: &str, b: &str) -> bool {
    a == b || base_letters(a).eq(base_letters(b))
}

/// How a scan of the name column ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Found(u32),
    /// Name matched but its result cell could not be read.
    Unverified(u32),
    /// End of data reached; the append anchor is valid.
    NotFound,
    /// A name page read was lost, so the rest of the sheet is unknown.
    Aborted,
}

/// First cell of row `index`, `""` when the store omitted it.
fn first_cell(rows: &CellMatrix, index: usize) -> &str {
    rows.get(index)
        .and_then(|row| row.first())
        .map_or("", String::as_str)
}

/// The test-result ledger of one document.
///
/// Rows are located by scanning the name column page by page from the first
/// data row. The scan remembers the last occupied row it saw, which
/// [`Ledger::update_test_result_by_name`] uses as the append anchor; the value
/// only describes the sheet as of the scan that produced it.
pub struct Ledger {
    document_id: String,
    access: Arc<RemoteAccess>,
    layout: ReportLayout,
    max_row_index: AtomicU32,
}

impl Ledger {
    pub fn new(document_id: impl Into<String>, access: Arc<RemoteAccess>, layout: ReportLayout) -> Self {
        let max_row_index = AtomicU32::new(layout.start_row.saturating_sub(1));
        Self {
            document_id: document_id.into(),
            access,
            layout,
            max_row_index,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Last occupied name row seen by the most recent scan.
    pub fn max_row_index(&self) -> u32 {
        self.max_row_index.load(Ordering::Relaxed)
    }

    /// Find the row of `test_name` in `sheet`.
    ///
    /// With `allow_existing_result` the first row carrying the name matches.
    /// Without it, rows whose result cell is already filled are skipped so a
    /// rerun lands on a fresh row. The scan ends at the first page the store
    /// returns empty, or once more than `max_blank_rows` consecutive name
    /// cells are empty; the blank run carries over page boundaries. Names
    /// match when they differ only by letter case or accents, and a matching
    /// row whose result cell cannot be read counts as open.
    ///
    /// Returns `None` when no row matches, either argument is empty, or a name
    /// page could not be read.
    pub async fn find_test_by_name(
        &self,
        test_name: &str,
        sheet: &str,
        allow_existing_result: bool,
    ) -> Option<u32> {
        if test_name.is_empty() || sheet.is_empty() {
            return None;
        }
        match self.scan(test_name, sheet, allow_existing_result).await {
            Scan::Found(row) | Scan::Unverified(row) => Some(row),
            Scan::NotFound | Scan::Aborted => None,
        }
    }

    async fn scan(&self, test_name: &str, sheet: &str, allow_existing_result: bool) -> Scan {
        let layout = &self.layout;
        let name_column = layout.name_column_letters();
        self.max_row_index
            .store(layout.start_row.saturating_sub(1), Ordering::Relaxed);

        let mut blank_count = 0;
        for page in 0..layout.max_pages {
            let Some((first_row, last_row)) = layout.page_rows(page) else {
                break;
            };
            let range = CellRange::column(sheet, &name_column, first_row, last_row);
            let Some(rows) = self
                .access
                .read_range_as(&range, ValueRender::Formatted, &self.document_id)
                .await
            else {
                warn!(document_id = %self.document_id, %range, "name column unreadable, scan aborted");
                return Scan::Aborted;
            };
            if rows.is_empty() {
                debug!(document_id = %self.document_id, %range, "no more rows");
                return Scan::NotFound;
            }

            for row in first_row..=last_row {
                let name = first_cell(&rows, (row - first_row) as usize);
                if name.is_empty() {
                    blank_count += 1;
                    if blank_count > layout.max_blank_rows {
                        debug!(document_id = %self.document_id, sheet, row, "blank run ends data");
                        return Scan::NotFound;
                    }
                    continue;
                }

                blank_count = 0;
                self.max_row_index.store(row, Ordering::Relaxed);
                if !same_test(name, test_name) {
                    continue;
                }
                if allow_existing_result {
                    return Scan::Found(row);
                }
                match self.has_result(sheet, row).await {
                    Some(false) => return Scan::Found(row),
                    Some(true) => {
                        debug!(document_id = %self.document_id, sheet, row, "row already has a result");
                    }
                    None => {
                        warn!(document_id = %self.document_id, sheet, row, "result cell unreadable");
                        return Scan::Unverified(row);
                    }
                }
            }
        }

        Scan::NotFound
    }

    /// Whether the result cell of `row` is filled, `None` if it could not be read.
    async fn has_result(&self, sheet: &str, row: u32) -> Option<bool> {
        let range = CellRange::cell(sheet, &self.layout.result_column_letters(), row);
        self.access
            .read_range_as(&range, ValueRender::Formatted, &self.document_id)
            .await
            .map(|rows| !first_cell(&rows, 0).is_empty())
    }

    /// Record `test_result` for `test_name`.
    ///
    /// With `overwrite` the first row of that name is updated in place. Without
    /// it only a row with an empty result is filled. When no row qualifies the
    /// name and result are appended below the last occupied row. Nothing is
    /// written when a read fails during the scan, since neither the append row
    /// nor the state of the matched row would be known.
    ///
    /// Returns the row written, or `None` if an argument is empty or a read or
    /// write was lost.
    pub async fn update_test_result_by_name(
        &self,
        test_name: &str,
        test_result: &str,
        sheet: &str,
        overwrite: bool,
    ) -> Option<u32> {
        if test_name.is_empty() || sheet.is_empty() {
            warn!(document_id = %self.document_id, sheet, test_name, "empty test or sheet name, result not recorded");
            return None;
        }

        let result_column = self.layout.result_column_letters();
        match self.scan(test_name, sheet, overwrite).await {
            Scan::Found(row) => {
                let range = CellRange::cell(sheet, &result_column, row);
                self.access
                    .write_value(test_result, &range, &self.document_id)
                    .await?;
                debug!(document_id = %self.document_id, sheet, test_name, row, "result updated");
                return Some(row);
            }
            Scan::Unverified(_) | Scan::Aborted => {
                warn!(document_id = %self.document_id, sheet, test_name, "scan incomplete, result not recorded");
                return None;
            }
            Scan::NotFound => {}
        }

        let row = self.max_row_index() + 1;
        let name_range = CellRange::cell(sheet, &self.layout.name_column_letters(), row);
        self.access
            .write_value(test_name, &name_range, &self.document_id)
            .await?;
        let result_range = CellRange::cell(sheet, &result_column, row);
        self.access
            .write_value(test_result, &result_range, &self.document_id)
            .await?;
        debug!(document_id = %self.document_id, sheet, test_name, row, "result appended");
        Some(row)
    }

    /// Start a new result column in `sheet`.
    ///
    /// Inserts an empty column at the result column index, shifting earlier
    /// results one column right, and stamps it with the local time in the row
    /// above the data region. Header formulas of the previous result column
    /// are copied into the new one when the layout asks for it. Every call
    /// adds another column.
    pub async fn create_new_result_col(&self, sheet: &str) -> Option<()> {
        if sheet.is_empty() {
            return None;
        }
        let column = self.layout.result_column_letters();

        let formulas = match self.layout.formula_rows() {
            Some((first, last)) if self.layout.carry_header_formulas => {
                let range = CellRange::column(sheet, &column, first, last);
                self.access
                    .read_range_as(&range, ValueRender::Formula, &self.document_id)
                    .await
                    .filter(|rows| !rows.is_empty())
            }
            _ => None,
        };

        self.access
            .insert_column(self.layout.result_column, sheet, &self.document_id)
            .await?;

        let stamp = result_column_stamp(&Local::now());
        if let Some(header_row) = self.layout.header_row() {
            let range = CellRange::cell(sheet, &column, header_row);
            self.access
                .write_value(&stamp, &range, &self.document_id)
                .await?;
        }

        if let Some(rows) = formulas {
            let count = rows.len() as u32;
            let values: CellMatrix = rows
                .into_iter()
                .map(|row| vec![row.into_iter().next().unwrap_or_default()])
                .collect();
            let range = CellRange::column(sheet, &column, 1, count);
            self.access
                .write_values(values, &range, &self.document_id)
                .await?;
        }

        info!(document_id = %self.document_id, sheet, %stamp, "new result column created");
        Some(())
    }
}
