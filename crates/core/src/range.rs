use crate::error::{LedgerError, LedgerResult};
use std::fmt;
use std::str::FromStr;

/// A rectangular cell range within one named sheet.
///
/// Rows are 1-based as shown in the sheet UI; columns are letters (`A`, `Z`,
/// `AA`). Rendered in A1 notation as `Sheet!C5:C14`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub sheet: String,
    pub start_col: String,
    pub start_row: u32,
    pub end_col: String,
    pub end_row: u32,
}

impl CellRange {
    pub fn new(
        sheet: impl Into<String>,
        start_col: impl Into<String>,
        start_row: u32,
        end_col: impl Into<String>,
        end_row: u32,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            start_col: start_col.into().to_ascii_uppercase(),
            start_row,
            end_col: end_col.into().to_ascii_uppercase(),
            end_row,
        }
    }

    /// A single cell.
    pub fn cell(sheet: impl Into<String>, col: &str, row: u32) -> Self {
        Self::new(sheet, col, row, col, row)
    }

    /// A vertical run of cells in one column, `start_row..=end_row`.
    pub fn column(sheet: impl Into<String>, col: &str, start_row: u32, end_row: u32) -> Self {
        Self::new(sheet, col, start_row, col, end_row)
    }

    /// Number of rows covered.
    pub fn row_count(&self) -> u32 {
        self.end_row.saturating_sub(self.start_row) + 1
    }

    /// Sheet name as it must appear before the `!`.
    fn quoted_sheet(&self) -> String {
        let plain = !self.sheet.is_empty()
            && self
                .sheet
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            self.sheet.clone()
        } else {
            format!("'{}'", self.sheet.replace('\'', "''"))
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}{}:{}{}",
            self.quoted_sheet(),
            self.start_col,
            self.start_row,
            self.end_col,
            self.end_row
        )
    }
}

impl FromStr for CellRange {
    type Err = LedgerError;

    /// Parse `Sheet!A1:B2`, `'My sheet'!A1:B2` or `Sheet!A1`.
    fn from_str(notation: &str) -> LedgerResult<Self> {
        let invalid = || LedgerError::InvalidRange(notation.to_string());

        let (sheet_part, cells) = notation.rsplit_once('!').ok_or_else(invalid)?;
        let sheet = if let Some(inner) = sheet_part
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
        {
            inner.replace("''", "'")
        } else {
            sheet_part.to_string()
        };
        if sheet.is_empty() {
            return Err(invalid());
        }

        let (start, end) = cells.split_once(':').unwrap_or((cells, cells));
        let (start_col, start_row) = parse_a1(start).ok_or_else(invalid)?;
        let (end_col, end_row) = parse_a1(end).ok_or_else(invalid)?;

        Ok(Self::new(sheet, start_col, start_row, end_col, end_row))
    }
}

/// Split A1-style cell notation ("C5", "aa10") into column letters and a 1-based row.
fn parse_a1(notation: &str) -> Option<(String, u32)> {
    let split_pos = notation.find(|c: char| c.is_ascii_digit())?;
    let (col_part, row_part) = notation.split_at(split_pos);
    if col_part.is_empty() || !col_part.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let row = row_part.parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((col_part.to_ascii_uppercase(), row))
}

/// Convert column letters to a 0-based column index.
/// A=0, B=1, ... Z=25, AA=26, AB=27, ...
pub fn column_letters_to_index(col_str: &str) -> LedgerResult<usize> {
    if col_str.is_empty() {
        return Err(LedgerError::InvalidRange(col_str.to_string()));
    }

    let mut col = 0;
    for b in col_str.to_ascii_uppercase().bytes() {
        if !b.is_ascii_uppercase() {
            return Err(LedgerError::InvalidRange(col_str.to_string()));
        }
        col = col * 26 + (b - b'A') as usize + 1;
    }

    Ok(col - 1)
}

/// Convert a 0-based column index to column letters.
/// 0=A, 1=B, ... 25=Z, 26=AA, 27=AB, ...
pub fn column_index_to_letters(mut col: usize) -> String {
    let mut result = String::new();
    col += 1;

    while col > 0 {
        col -= 1;
        result.insert(0, ((col % 26) as u8 + b'A') as char);
        col /= 26;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_plain_sheet() {
        let range = CellRange::new("Run1", "C", 5, "C", 14);
        assert_eq!(range.to_string(), "Run1!C5:C14");
        assert_eq!(CellRange::cell("Run1", "e", 7).to_string(), "Run1!E7:E7");
    }

    #[test]
    fn test_display_quotes_sheet_names() {
        assert_eq!(
            CellRange::cell("Nightly run", "C", 5).to_string(),
            "'Nightly run'!C5:C5"
        );
        assert_eq!(
            CellRange::cell("Bob's", "A", 1).to_string(),
            "'Bob''s'!A1:A1"
        );
    }

    #[test]
    fn test_parse() {
        let range: CellRange = "Run1!C5:C14".parse().unwrap();
        assert_eq!(range, CellRange::column("Run1", "C", 5, 14));
        assert_eq!(range.row_count(), 10);

        let range: CellRange = "'Bob''s run'!aa3".parse().unwrap();
        assert_eq!(range.sheet, "Bob's run");
        assert_eq!(range.start_col, "AA");
        assert_eq!((range.start_row, range.end_row), (3, 3));
    }

    #[test]
    fn test_parse_errors() {
        assert!("C5:C14".parse::<CellRange>().is_err());
        assert!("Run1!C0".parse::<CellRange>().is_err());
        assert!("Run1!5C".parse::<CellRange>().is_err());
        assert!("!A1".parse::<CellRange>().is_err());
        assert!("Run1!A1:B".parse::<CellRange>().is_err());
    }

    #[test]
    fn test_column_letters_to_index() {
        assert_eq!(column_letters_to_index("A").unwrap(), 0);
        assert_eq!(column_letters_to_index("e").unwrap(), 4);
        assert_eq!(column_letters_to_index("Z").unwrap(), 25);
        assert_eq!(column_letters_to_index("AA").unwrap(), 26);
        assert_eq!(column_letters_to_index("ZZ").unwrap(), 701);
        assert!(column_letters_to_index("").is_err());
        assert!(column_letters_to_index("A1").is_err());
    }

    #[test]
    fn test_column_index_to_letters() {
        assert_eq!(column_index_to_letters(0), "A");
        assert_eq!(column_index_to_letters(2), "C");
        assert_eq!(column_index_to_letters(4), "E");
        assert_eq!(column_index_to_letters(25), "Z");
        assert_eq!(column_index_to_letters(26), "AA");
        assert_eq!(column_index_to_letters(701), "ZZ");
        assert_eq!(column_index_to_letters(702), "AAA");
    }
}
