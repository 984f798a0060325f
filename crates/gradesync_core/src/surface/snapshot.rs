//! Fresh point-in-time read of a destination region.

use super::{SurfaceResult, TabularSurface};
use crate::model::cell::{CellRange, CellRef, CellValue};
use log::debug;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Values and merge metadata of one sheet region, read in one pass.
///
/// Never cached across runs: callers build a new snapshot per operation
/// because the destination may be edited between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSnapshot {
    origin: CellRef,
    rows: Vec<Vec<CellValue>>,
    merges: Vec<CellRange>,
}

impl SheetSnapshot {
    /// Reads `range` and the merged blocks from `surface`.
    pub fn read<S: TabularSurface + ?Sized>(surface: &S, range: &CellRange) -> SurfaceResult<Self> {
        let rows = surface.read_range(range)?;
        let merges = surface.merged_blocks()?;
        let snapshot = Self {
            origin: range.start,
            rows,
            merges,
        };
        debug!(
            "event=snapshot_read module=surface status=ok destination={} range={} rows={} cols={} merges={}",
            surface.describe(),
            range,
            snapshot.height(),
            snapshot.width(),
            snapshot.merges.len()
        );
        Ok(snapshot)
    }

    /// Builds a snapshot from rows anchored at `origin`.
    pub fn from_rows(origin: CellRef, rows: Vec<Vec<CellValue>>, merges: Vec<CellRange>) -> Self {
        Self {
            origin,
            rows,
            merges,
        }
    }

    pub fn origin(&self) -> CellRef {
        self.origin
    }

    /// Value at an absolute 1-based position; empty outside the region.
    pub fn cell_at(&self, row: u32, col: u32) -> &CellValue {
        if row < self.origin.row || col < self.origin.col {
            return &EMPTY_CELL;
        }
        let r = (row - self.origin.row) as usize;
        let c = (col - self.origin.col) as usize;
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Text content at a position, only for text cells.
    pub fn text_at(&self, row: u32, col: u32) -> Option<&str> {
        self.cell_at(row, col).as_text()
    }

    pub fn merged_blocks(&self) -> &[CellRange] {
        &self.merges
    }

    /// Rows read, trailing empty rows excluded.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row read.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Last row holding any data (0 when the snapshot is empty).
    pub fn last_row(&self) -> u32 {
        match self.height() {
            0 => 0,
            height => self.origin.row + height as u32 - 1,
        }
    }

    /// Last column holding data in any row (0 when the snapshot is empty).
    pub fn last_column(&self) -> u32 {
        match self.width() {
            0 => 0,
            width => self.origin.col + width as u32 - 1,
        }
    }
}
