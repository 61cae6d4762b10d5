//! Shared fixtures for ledger tests.

#![allow(dead_code)]

use std::sync::Arc;
use testledger_core::Pacing;
use testledger_http::{MemorySheets, RemoteAccess};
use testledger_report::{Ledger, ReportLayout};

pub const DOC: &str = "doc-1";
pub const SHEET: &str = "Run1";

/// A ledger over an in-memory document with one empty sheet.
pub fn ledger() -> (Arc<MemorySheets>, Ledger) {
    ledger_with_layout(ReportLayout::default())
}

pub fn ledger_with_layout(layout: ReportLayout) -> (Arc<MemorySheets>, Ledger) {
    let sheets = Arc::new(MemorySheets::new());
    sheets.add_sheet(DOC, SHEET);
    let access = Arc::new(RemoteAccess::in_memory(Arc::clone(&sheets), Pacing::none()));
    (sheets, Ledger::new(DOC, access, layout))
}

/// A ledger whose name column is filled from the first data row.
pub fn ledger_with_names(names: &[&str]) -> (Arc<MemorySheets>, Ledger) {
    let (sheets, ledger) = ledger();
    sheets.set_column(DOC, SHEET, "C", 5, names);
    (sheets, ledger)
}

/// Non-empty names from the first data row down to `last_row`.
pub fn names(sheets: &MemorySheets, last_row: u32) -> Vec<(u32, String)> {
    (5..=last_row)
        .map(|row| (row, sheets.cell(DOC, SHEET, "C", row)))
        .filter(|(_, name)| !name.is_empty())
        .collect()
}
