use gradesync_core::surface::{CellWriteFailure, SurfaceResult};
use gradesync_core::{
    apply, CellRange, CellRef, CellValue, CellWrite, CellWriteReport, PlannedWrite, SurfaceKind,
    SyncError, TabularSurface, WritePlan,
};
use std::path::{Path, PathBuf};

/// Records every batch; optionally file-backed and optionally failing cells.
struct RecordingSurface {
    backing: Option<PathBuf>,
    failing: Vec<CellRef>,
    batches: Vec<Vec<CellWrite>>,
}

impl RecordingSurface {
    fn service(failing: Vec<CellRef>) -> Self {
        Self {
            backing: None,
            failing,
            batches: Vec::new(),
        }
    }

    fn file(path: PathBuf) -> Self {
        Self {
            backing: Some(path),
            failing: Vec::new(),
            batches: Vec::new(),
        }
    }
}

impl TabularSurface for RecordingSurface {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    fn kind(&self) -> SurfaceKind {
        if self.backing.is_some() {
            SurfaceKind::File
        } else {
            SurfaceKind::Service
        }
    }

    fn read_range(&self, _range: &CellRange) -> SurfaceResult<Vec<Vec<CellValue>>> {
        Ok(Vec::new())
    }

    fn merged_blocks(&self) -> SurfaceResult<Vec<CellRange>> {
        Ok(Vec::new())
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> SurfaceResult<CellWriteReport> {
        self.batches.push(writes.to_vec());
        let failures: Vec<CellWriteFailure> = writes
            .iter()
            .filter(|write| self.failing.contains(&write.cell))
            .map(|write| CellWriteFailure {
                cell: write.cell,
                message: "403 forbidden".to_string(),
            })
            .collect();
        Ok(CellWriteReport {
            written: writes.len() - failures.len(),
            failures,
        })
    }

    fn backing_file(&self) -> Option<&Path> {
        self.backing.as_deref()
    }
}

fn plan_of(cells: &[(u32, u32, f64)]) -> WritePlan {
    let mut plan = WritePlan::default();
    for (row, col, value) in cells {
        plan.insert(
            CellRef::new(*row, *col),
            PlannedWrite {
                student: format!("student {row}"),
                matched_name: format!("student {row}"),
                value: *value,
                previous: CellValue::Empty,
            },
        );
    }
    plan
}

#[test]
fn empty_plan_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("notas.xlsx");
    std::fs::write(&workbook, b"original").unwrap();
    let mut surface = RecordingSurface::file(workbook);

    let outcome = apply(&mut surface, WritePlan::default()).unwrap();
    assert_eq!(outcome.written, 0);
    assert_eq!(outcome.backup_path, None);
    assert!(surface.batches.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn service_failures_are_reported_per_cell() {
    let mut surface = RecordingSurface::service(vec![CellRef::new(11, 4)]);
    let plan = plan_of(&[(10, 4, 8.5), (11, 4, 7.0), (12, 4, 6.0)]);

    let outcome = apply(&mut surface, plan).unwrap();
    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.backup_path, None);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].cell.to_string(), "D11");
    assert_eq!(surface.batches.len(), 1);
    assert_eq!(surface.batches[0].len(), 3);
}

#[test]
fn failed_backup_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.xlsx");
    let mut surface = RecordingSurface::file(missing);

    let err = apply(&mut surface, plan_of(&[(10, 4, 8.5)])).unwrap_err();
    match err {
        SyncError::Backup { path, .. } => {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("gone_backup_"), "{name}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(surface.batches.is_empty());
}

#[test]
fn backup_is_a_byte_copy_next_to_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("notas 1A.xlsx");
    std::fs::write(&workbook, b"original bytes").unwrap();
    let mut surface = RecordingSurface::file(workbook.clone());

    let outcome = apply(&mut surface, plan_of(&[(10, 4, 8.5)])).unwrap();
    let backup = outcome.backup_path.unwrap();
    assert_eq!(backup.parent(), workbook.parent());

    let name = backup.file_name().unwrap().to_string_lossy().into_owned();
    let stamp = name
        .strip_prefix("notas 1A_backup_")
        .and_then(|rest| rest.strip_suffix(".xlsx"))
        .unwrap();
    assert_eq!(stamp.len(), "YYYYMMDD_HHMMSS".len());
    assert_eq!(stamp.as_bytes()[8], b'_');
    assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));

    assert_eq!(std::fs::read(&backup).unwrap(), b"original bytes");
    assert_eq!(outcome.written, 1);
}

#[test]
fn back_to_back_runs_keep_every_backup() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("notas.xlsx");
    std::fs::write(&workbook, b"before any sync").unwrap();
    let mut surface = RecordingSurface::file(workbook.clone());

    let first = apply(&mut surface, plan_of(&[(10, 4, 8.5)]))
        .unwrap()
        .backup_path
        .unwrap();
    // Stands in for the first write landing in the file.
    std::fs::write(&workbook, b"after first sync").unwrap();
    let second = apply(&mut surface, plan_of(&[(10, 4, 9.0)]))
        .unwrap()
        .backup_path
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(std::fs::read(&first).unwrap(), b"before any sync");
    assert_eq!(std::fs::read(&second).unwrap(), b"after first sync");
}
