//! Where the ledger lives inside a sheet.

use testledger_core::column_index_to_letters;

/// Column holding test names.
pub const TEST_NAME_COLUMN: &str = "C";
/// 0-based index of [`TEST_NAME_COLUMN`].
pub const TEST_NAME_COLUMN_INDEX: usize = 2;
/// Column holding the current test results.
pub const TEST_RESULT_COLUMN: &str = "E";
/// 0-based index of [`TEST_RESULT_COLUMN`].
pub const TEST_RESULT_COLUMN_INDEX: usize = 4;
/// First row of the data region. The row above it holds the column timestamp.
pub const TEST_NAME_START_ROW: u32 = 5;
/// Consecutive empty name cells tolerated before the scan treats the data as ended.
pub const MAX_BLANK_ROW: u32 = 5;
/// Rows read per page while scanning.
pub const PAGE_SIZE: u32 = 10;
/// Upper bound on pages scanned.
pub const MAX_PAGES: u32 = 1000;

/// Placement of the name and result columns and the scan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    /// 0-based index of the test name column.
    pub name_column: usize,
    /// 0-based index of the result column. New result columns are inserted here.
    pub result_column: usize,
    /// First data row, 1-based.
    pub start_row: u32,
    pub max_blank_rows: u32,
    pub page_size: u32,
    pub max_pages: u32,
    /// Copy header formulas into a newly created result column.
    pub carry_header_formulas: bool,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            name_column: TEST_NAME_COLUMN_INDEX,
            result_column: TEST_RESULT_COLUMN_INDEX,
            start_row: TEST_NAME_START_ROW,
            max_blank_rows: MAX_BLANK_ROW,
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
            carry_header_formulas: true,
        }
    }
}

impl ReportLayout {
    pub fn name_column_letters(&self) -> String {
        column_index_to_letters(self.name_column)
    }

    pub fn result_column_letters(&self) -> String {
        column_index_to_letters(self.result_column)
    }

    /// Row directly above the data region, where the timestamp goes.
    pub fn header_row(&self) -> Option<u32> {
        self.start_row.checked_sub(1).filter(|row| *row >= 1)
    }

    /// Rows above the timestamp row whose formulas are carried forward, `1..=last`.
    pub fn formula_rows(&self) -> Option<(u32, u32)> {
        self.start_row
            .checked_sub(2)
            .filter(|last| *last >= 1)
            .map(|last| (1, last))
    }

    /// First and last row of scan page `page`, `None` past the last addressable row.
    pub fn page_rows(&self, page: u32) -> Option<(u32, u32)> {
        let size = self.page_size.max(1);
        let first = page
            .checked_mul(size)
            .and_then(|offset| self.start_row.checked_add(offset))?;
        let last = first.checked_add(size - 1)?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = ReportLayout::default();
        assert_eq!(layout.name_column_letters(), TEST_NAME_COLUMN);
        assert_eq!(layout.result_column_letters(), TEST_RESULT_COLUMN);
        assert_eq!(layout.header_row(), Some(4));
        assert_eq!(layout.formula_rows(), Some((1, 3)));
    }

    #[test]
    fn test_page_rows() {
        let layout = ReportLayout::default();
        assert_eq!(layout.page_rows(0), Some((5, 14)));
        assert_eq!(layout.page_rows(1), Some((15, 24)));
        assert_eq!(layout.page_rows(999), Some((9995, 10004)));
    }

    #[test]
    fn test_page_rows_stop_at_row_limit() {
        let layout = ReportLayout {
            page_size: u32::MAX / 2,
            max_pages: u32::MAX,
            ..ReportLayout::default()
        };
        assert_eq!(layout.page_rows(0), Some((5, u32::MAX / 2 + 4)));
        assert_eq!(layout.page_rows(2), None);
        assert_eq!(layout.page_rows(u32::MAX), None);

        let layout = ReportLayout {
            start_row: u32::MAX - 3,
            ..ReportLayout::default()
        };
        assert_eq!(layout.page_rows(0), None);
    }

    #[test]
    fn test_layout_without_header_space() {
        let layout = ReportLayout {
            start_row: 2,
            ..ReportLayout::default()
        };
        assert_eq!(layout.header_row(), Some(1));
        assert_eq!(layout.formula_rows(), None);

        let layout = ReportLayout {
            start_row: 1,
            ..ReportLayout::default()
        };
        assert_eq!(layout.header_row(), None);
        assert_eq!(layout.formula_rows(), None);
    }
}
