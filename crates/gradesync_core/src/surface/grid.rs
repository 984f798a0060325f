//! In-memory value grid.
//!
//! Plain grids carry no merge metadata unless one is supplied, which is how
//! values-only exports (and dry runs over a copied region) look to the engine.

use super::{CellWrite, CellWriteReport, SurfaceKind, SurfaceResult, TabularSurface};
use crate::model::cell::{CellRange, CellRef, CellValue};

/// Sheet held entirely in memory, anchored at `A1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSurface {
    name: String,
    rows: Vec<Vec<CellValue>>,
    merges: Vec<CellRange>,
}

impl GridSurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copies a snapshot-like set of rows anchored at `A1`.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
            merges: Vec::new(),
        }
    }

    /// Declares a merged block.
    pub fn with_merge(mut self, range: CellRange) -> Self {
        self.merges.push(range);
        self
    }

    /// Stores `value` at `cell`; row or column 0 is outside the grid and ignored.
    pub fn set(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        if cell.row == 0 || cell.col == 0 {
            return;
        }
        let r = (cell.row - 1) as usize;
        let c = (cell.col - 1) as usize;
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.rows[r];
        if row.len() <= c {
            row.resize(c + 1, CellValue::Empty);
        }
        row[c] = value.into();
    }

    pub fn get(&self, cell: CellRef) -> CellValue {
        if cell.row == 0 || cell.col == 0 {
            return CellValue::Empty;
        }
        self.rows
            .get((cell.row - 1) as usize)
            .and_then(|row| row.get((cell.col - 1) as usize))
            .cloned()
            .unwrap_or_default()
    }
}

impl TabularSurface for GridSurface {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::InMemory
    }

    fn read_range(&self, range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>> {
        let mut out = Vec::with_capacity(range.height() as usize);
        for row in range.start.row..=range.end.row {
            let mut cells: Vec<CellValue> = (range.start.col..=range.end.col)
                .map(|col| self.get(CellRef::new(row, col)))
                .collect();
            while cells.last().is_some_and(CellValue::is_empty) {
                cells.pop();
            }
            out.push(cells);
        }
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    fn merged_blocks(&self) -> SurfaceResult<Vec<CellRange>> {
        Ok(self.merges.clone())
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport> {
        for write in writes {
            self.set(write.cell, write.value);
        }
        Ok(CellWriteReport {
            written: writes.len(),
            failures: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::GridSurface;
    use crate::model::cell::{CellRange, CellRef, CellValue};
    use crate::surface::{CellWrite, TabularSurface};

    #[test]
    fn read_range_is_relative_and_trims_trailing_empties() {
        let mut grid = GridSurface::new("t");
        grid.set(CellRef::new(2, 2), "b2");
        grid.set(CellRef::new(3, 4), 4.0);

        let range: CellRange = "B2:E5".parse().unwrap();
        let rows = grid.read_range(&range).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![CellValue::from("b2")]);
        assert_eq!(
            rows[1],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Number(4.0)]
        );
    }

    #[test]
    fn zero_coordinates_are_ignored() {
        let mut grid = GridSurface::new("t");
        grid.set(CellRef::new(0, 3), 1.0);
        grid.set(CellRef::new(2, 0), 1.0);
        assert_eq!(grid, GridSurface::new("t"));
        assert_eq!(grid.get(CellRef::new(0, 3)), CellValue::Empty);
    }

    #[test]
    fn write_cells_grows_grid() {
        let mut grid = GridSurface::new("t");
        let report = grid
            .write_cells(&[CellWrite {
                cell: CellRef::new(10, 4),
                value: 8.5,
            }])
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(grid.get(CellRef::new(10, 4)), CellValue::Number(8.5));
    }
}
