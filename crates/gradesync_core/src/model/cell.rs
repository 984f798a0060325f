//! Spreadsheet coordinates and cell values.
//!
//! # Responsibility
//! - Provide A1-style cell and range references shared by every destination.
//! - Model the small set of cell value shapes the engine reads back.
//!
//! # Invariants
//! - Rows and columns are 1-based everywhere in the public API.
//! - `CellRef` orders by `(row, col)`, so plans iterate top-to-bottom.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Largest column index representable as `XFD` in xlsx files.
pub const MAX_COLUMN: u32 = 16_384;

/// Errors produced while parsing A1 references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRefError {
    Empty,
    InvalidColumn(String),
    InvalidReference(String),
    InvalidRange(String),
}

impl Display for CellRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "cell reference must not be empty"),
            Self::InvalidColumn(value) => write!(f, "invalid column letters: `{value}`"),
            Self::InvalidReference(value) => write!(f, "invalid cell reference: `{value}`"),
            Self::InvalidRange(value) => write!(f, "invalid cell range: `{value}`"),
        }
    }
}

impl Error for CellRefError {}

/// Converts a 1-based column index to letters (`1 -> A`, `27 -> AA`).
pub fn column_letters(col: u32) -> String {
    let mut name = Vec::new();
    let mut n = col;
    while n > 0 {
        n -= 1;
        name.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Parses column letters (case-insensitive) into a 1-based index.
pub fn column_index(letters: &str) -> Result<u32, CellRefError> {
    let trimmed = letters.trim();
    if trimmed.is_empty() {
        return Err(CellRefError::Empty);
    }
    let mut index: u32 = 0;
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(CellRefError::InvalidColumn(trimmed.to_string()));
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        index = index
            .checked_mul(26)
            .and_then(|value| value.checked_add(digit))
            .filter(|value| *value <= MAX_COLUMN)
            .ok_or_else(|| CellRefError::InvalidColumn(trimmed.to_string()))?;
    }
    Ok(index)
}

/// One cell coordinate, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Column letters of this reference.
    pub fn column_letters(&self) -> String {
        column_letters(self.col)
    }
}

impl Display for CellRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = CellRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().replace('$', "");
        if trimmed.is_empty() {
            return Err(CellRefError::Empty);
        }
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| CellRefError::InvalidReference(trimmed.clone()))?;
        let (letters, digits) = trimmed.split_at(split);
        if letters.is_empty() {
            return Err(CellRefError::InvalidReference(trimmed.clone()));
        }
        let col = column_index(letters)?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|row| *row > 0)
            .ok_or_else(|| CellRefError::InvalidReference(trimmed.clone()))?;
        Ok(Self { row, col })
    }
}

/// Inclusive rectangular range, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    /// Builds a range, swapping corners so `start` is always top-left.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn single(cell: CellRef) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// Renders `Sheet!A1:B2`, quoting the sheet name the way Sheets/Excel expect.
    pub fn qualified(&self, sheet: &str) -> String {
        let escaped = sheet.replace('\'', "''");
        format!("'{escaped}'!{self}")
    }
}

impl Display for CellRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for CellRange {
    type Err = CellRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let local = trimmed.rsplit_once('!').map_or(trimmed, |(_, range)| range);
        match local.split_once(':') {
            Some((a, b)) => {
                let start = a
                    .parse::<CellRef>()
                    .map_err(|_| CellRefError::InvalidRange(trimmed.to_string()))?;
                let end = b
                    .parse::<CellRef>()
                    .map_err(|_| CellRefError::InvalidRange(trimmed.to_string()))?;
                Ok(Self::new(start, end))
            }
            None => local.parse::<CellRef>().map(Self::single),
        }
    }
}

/// Value read back from a destination cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Text content, only for text cells.
    ///
    /// Numbers and booleans never carry a usable personal name.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Display form used for header/activity label scans.
    pub fn to_display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text.clone(),
            Self::Number(value) => format_number(*value),
            Self::Bool(value) => value.to_string(),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "(empty)"),
            other => write!(f, "{}", other.to_display()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{column_index, column_letters, CellRange, CellRef, CellRefError, CellValue};

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(16_384), "XFD");
    }

    #[test]
    fn column_index_is_case_insensitive_and_bounded() {
        assert_eq!(column_index("c").unwrap(), 3);
        assert_eq!(column_index("AA").unwrap(), 27);
        assert!(matches!(
            column_index("XFE"),
            Err(CellRefError::InvalidColumn(_))
        ));
        assert!(matches!(column_index("C1"), Err(CellRefError::InvalidColumn(_))));
    }

    #[test]
    fn cell_ref_parses_and_displays() {
        let cell: CellRef = "$D$10".parse().unwrap();
        assert_eq!(cell, CellRef::new(10, 4));
        assert_eq!(cell.to_string(), "D10");
        assert!("10".parse::<CellRef>().is_err());
        assert!("D0".parse::<CellRef>().is_err());
    }

    #[test]
    fn range_parses_sheet_qualified_input() {
        let range: CellRange = "EVALUACIÓN!A1:Z50".parse().unwrap();
        assert_eq!(range.start, CellRef::new(1, 1));
        assert_eq!(range.end, CellRef::new(50, 26));
        assert_eq!(range.width(), 26);
        assert_eq!(range.qualified("EVALUACIÓN"), "'EVALUACIÓN'!A1:Z50");
    }

    #[test]
    fn only_text_cells_expose_text() {
        assert_eq!(CellValue::from("Ana").as_text(), Some("Ana"));
        assert_eq!(CellValue::Number(3.0).as_text(), None);
        assert_eq!(CellValue::Number(3.0).to_display(), "3");
        assert!(CellValue::Text("  ".into()).is_empty());
    }
}
