//! Local xlsx workbook destination.
//!
//! # Responsibility
//! - Read values and true merge metadata of one worksheet.
//! - Commit numeric writes back into the same file.
//!
//! # Invariants
//! - Every read opens the file anew; nothing is cached between operations.
//! - A write batch is one load-modify-save cycle; the file on disk is either
//!   the old package or the fully patched one.
//!
//! # See also
//! - `xlsx_patch` for the package rewrite.

use super::xlsx_patch::patch_workbook_cells;
use super::{CellWrite, CellWriteReport, SurfaceError, SurfaceKind, SurfaceResult, TabularSurface};
use crate::model::cell::{CellRange, CellRef, CellValue};
use calamine::{open_workbook, Data, Reader, Xlsx};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

type XlsxReader = Xlsx<BufReader<File>>;

/// One worksheet of an xlsx file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSurface {
    path: PathBuf,
    sheet: String,
}

impl WorkbookSurface {
    /// Binds to `sheet` of the workbook at `path`.
    ///
    /// # Errors
    /// - `Io` when the file is missing.
    /// - `Workbook` when it is not a readable xlsx package.
    /// - `SheetNotFound` when the workbook has no such sheet.
    pub fn open(path: impl Into<PathBuf>, sheet: impl Into<String>) -> SurfaceResult<Self> {
        let surface = Self {
            path: path.into(),
            sheet: sheet.into(),
        };
        if !surface.path.is_file() {
            return Err(SurfaceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("workbook `{}` not found", surface.path.display()),
            )));
        }
        let reader = surface.reader()?;
        if !reader.sheet_names().iter().any(|name| *name == surface.sheet) {
            return Err(SurfaceError::SheetNotFound(surface.sheet.clone()));
        }
        Ok(surface)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    fn reader(&self) -> SurfaceResult<XlsxReader> {
        open_workbook(&self.path).map_err(|err: calamine::XlsxError| {
            SurfaceError::Workbook(format!("open `{}`: {err}", self.path.display()))
        })
    }
}

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(text) => CellValue::from(text.as_str()),
        Data::Float(value) => CellValue::Number(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) => CellValue::Number(value.as_f64()),
        other => CellValue::Text(other.to_string()),
    }
}

impl TabularSurface for WorkbookSurface {
    fn describe(&self) -> String {
        format!("{}[{}]", self.path.display(), self.sheet)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::File
    }

    fn read_range(&self, range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>> {
        let mut reader = self.reader()?;
        let data = reader
            .worksheet_range(&self.sheet)
            .map_err(|err| match err {
                calamine::XlsxError::WorksheetNotFound(name) => SurfaceError::SheetNotFound(name),
                other => SurfaceError::Workbook(other.to_string()),
            })?;

        let mut out = Vec::with_capacity(range.height() as usize);
        for row in range.start.row..=range.end.row {
            let mut cells: Vec<CellValue> = (range.start.col..=range.end.col)
                .map(|col| {
                    data.get_value((row - 1, col - 1))
                        .map(to_cell_value)
                        .unwrap_or_default()
                })
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
        let mut reader = self.reader()?;
        reader
            .load_merged_regions()
            .map_err(|err| SurfaceError::Workbook(format!("merged regions: {err}")))?;
        Ok(reader
            .merged_regions_by_sheet(&self.sheet)
            .into_iter()
            .map(|(_, _, dims)| {
                CellRange::new(
                    CellRef::new(dims.start.0 + 1, dims.start.1 + 1),
                    CellRef::new(dims.end.0 + 1, dims.end.1 + 1),
                )
            })
            .collect())
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport> {
        if writes.is_empty() {
            return Ok(CellWriteReport::default());
        }
        let stats = patch_workbook_cells(&self.path, &self.sheet, writes)?;
        info!(
            "event=workbook_save module=surface status=ok path={} part={} cells={} dropped_calc_chain={}",
            self.path.display(),
            stats.worksheet_part,
            stats.cells,
            stats.removed_formulas
        );
        Ok(CellWriteReport {
            written: stats.cells,
            failures: Vec::new(),
        })
    }

    fn backing_file(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::to_cell_value;
    use crate::model::cell::CellValue;
    use calamine::Data;

    #[test]
    fn calamine_values_map_to_cell_values() {
        assert_eq!(to_cell_value(&Data::Empty), CellValue::Empty);
        assert_eq!(to_cell_value(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(
            to_cell_value(&Data::String("Ana".to_string())),
            CellValue::Text("Ana".to_string())
        );
        assert_eq!(to_cell_value(&Data::String(String::new())), CellValue::Empty);
    }
}
