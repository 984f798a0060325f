//! Destination tabular surfaces.
//!
//! # Responsibility
//! - Define the one capability interface every destination implements.
//! - Keep destination specifics (xlsx package, REST API) behind it.
//!
//! # Invariants
//! - Rows/columns are 1-based; `read_range` returns rows relative to
//!   `range.start` and may be ragged (trailing empties trimmed).
//! - `merged_blocks` is empty for plain value grids.
//! - File-backed surfaces expose `backing_file()` so writers can back up
//!   before mutating; service-backed surfaces return `None`.

use crate::model::cell::{CellRange, CellRef, CellValue};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub mod grid;
pub mod remote;
pub mod snapshot;
pub mod workbook;
mod xlsx_patch;

pub use grid::GridSurface;
pub use remote::{RemoteSheetConfig, RemoteSheetSurface};
pub use snapshot::SheetSnapshot;
pub use workbook::WorkbookSurface;

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Destination binding failures.
#[derive(Debug)]
pub enum SurfaceError {
    Io(std::io::Error),
    /// Workbook package, XML, or reader failure.
    Workbook(String),
    SheetNotFound(String),
    InvalidRange(String),
    /// Remote service unreachable, unauthorized, or answered non-success.
    Connectivity(String),
}

impl Display for SurfaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Workbook(message) => write!(f, "workbook error: {message}"),
            Self::SheetNotFound(name) => write!(f, "sheet `{name}` does not exist"),
            Self::InvalidRange(message) => write!(f, "invalid range: {message}"),
            Self::Connectivity(message) => write!(f, "destination unreachable: {message}"),
        }
    }
}

impl Error for SurfaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SurfaceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Kind of destination, used for logging and backup policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    InMemory,
    File,
    Service,
}

impl SurfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InMemory => "memory",
            Self::File => "file",
            Self::Service => "service",
        }
    }
}

/// One numeric value destined for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellWrite {
    pub cell: CellRef,
    pub value: f64,
}

/// A single cell write that did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWriteFailure {
    pub cell: CellRef,
    pub message: String,
}

/// Result of a batch write; `written` counts successful cells only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellWriteReport {
    pub written: usize,
    pub failures: Vec<CellWriteFailure>,
}

/// Uniform read/write capability over a destination sheet.
pub trait TabularSurface {
    /// Human-readable identity for logs (path or document id plus sheet).
    fn describe(&self) -> String;

    fn kind(&self) -> SurfaceKind;

    /// Reads current values of `range`.
    fn read_range(&self, range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>>;

    /// Merged ranges of the sheet; empty when the source has no merge model.
    fn merged_blocks(&self) -> SurfaceResult<Vec<CellRange>>;

    /// Writes numeric values.
    ///
    /// File-backed surfaces commit the whole batch in one save or fail as a
    /// whole; service-backed surfaces write each cell independently and
    /// report per-cell failures.
    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport>;

    /// Path of the underlying file when the destination is file-backed.
    fn backing_file(&self) -> Option<&Path> {
        None
    }
}

impl<T: TabularSurface + ?Sized> TabularSurface for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn kind(&self) -> SurfaceKind {
        (**self).kind()
    }

    fn read_range(&self, range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>> {
        (**self).read_range(range)
    }

    fn merged_blocks(&self) -> SurfaceResult<Vec<CellRange>> {
        (**self).merged_blocks()
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport> {
        (**self).write_cells(writes)
    }

    fn backing_file(&self) -> Option<&Path> {
        (**self).backing_file()
    }
}
