use gradesync_core::{
    CellRange, CellRef, CellValue, CellWrite, DestinationLayout, GradeSync, MatchPolicy,
    RosterRecord, SurfaceError, TabularSurface, WorkbookSurface,
};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Read;
use std::path::{Path, PathBuf};

const SHEET: &str = "EVALUACIÓN";

/// Two merged period headers over row 5, labels in row 9, names in column C.
fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("notas 2B.xlsx");
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let grade = Format::new().set_num_format("0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET).unwrap();
    sheet
        .merge_range(4, 3, 4, 5, "RESULTADO APRENDIZAJE 1", &header)
        .unwrap();
    sheet
        .merge_range(4, 6, 4, 8, "RESULTADO APRENDIZAJE 2", &header)
        .unwrap();
    sheet.write_string(8, 2, "ALUMNO").unwrap();
    for (col, label) in [
        (3u16, "TAREA 1"),
        (4, "TAREA 2"),
        (5, "ACTIVIDAD 3"),
        (6, "TAREA 1"),
        (7, "TAREA 2"),
        (8, "TAREA 3"),
        (9, "TAREA 9"),
    ] {
        sheet.write_string(8, col, label).unwrap();
    }
    sheet.write_string(9, 2, "Ana García").unwrap();
    sheet.write_string(10, 2, "Juan Pérez Ruiz").unwrap();
    sheet.write_string(11, 2, "Luis Gómez").unwrap();
    sheet.write_number_with_format(9, 3, 4.0, &grade).unwrap();
    sheet.write_formula(9, 4, "=1+1").unwrap();

    let summary = workbook.add_worksheet();
    summary.set_name("Resumen").unwrap();
    summary.write_string(0, 0, "total").unwrap();

    workbook.save(&path).unwrap();
    path
}

fn sync_for(path: &Path) -> GradeSync<WorkbookSurface> {
    let surface = WorkbookSurface::open(path, SHEET).unwrap();
    GradeSync::new(surface, DestinationLayout::default(), MatchPolicy::default())
}

fn read_cell(path: &Path, sheet: &str, cell: &str) -> CellValue {
    let surface = WorkbookSurface::open(path, sheet).unwrap();
    let range: CellRange = cell.parse().unwrap();
    surface
        .read_range(&range)
        .unwrap()
        .first()
        .and_then(|row| row.first().cloned())
        .unwrap_or_default()
}

/// Raw XML of one `<c>` element of the first worksheet.
fn cell_xml(path: &Path, reference: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    let start = xml.find(&format!("<c r=\"{reference}\"")).unwrap();
    let end = start + xml[start..].find("</c>").unwrap();
    xml[start..end].to_string()
}

#[test]
fn open_rejects_missing_file_and_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());

    assert!(matches!(
        WorkbookSurface::open(dir.path().join("nope.xlsx"), SHEET),
        Err(SurfaceError::Io(_))
    ));
    assert!(matches!(
        WorkbookSurface::open(&path, "Hoja1"),
        Err(SurfaceError::SheetNotFound(name)) if name == "Hoja1"
    ));
}

#[test]
fn merged_headers_bound_the_periods() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let sync = sync_for(&path);

    let merges = sync.surface().merged_blocks().unwrap();
    assert!(merges.contains(&"D5:F5".parse().unwrap()));
    assert!(merges.contains(&"G5:I5".parse().unwrap()));

    let map = sync.activity_map().unwrap();
    assert_eq!(map.resolve("1er Trimestre", "TAREA 3"), Some(6));
    assert_eq!(map.resolve("2do Trimestre", "TAREA 1"), Some(7));
    assert_eq!(map.resolve("2do Trimestre", "TAREA 3"), Some(9));
    // J9 sits outside every merged header.
    assert_eq!(map.resolve("2do Trimestre", "TAREA 9"), None);
}

#[test]
fn run_backs_up_then_writes_keeping_cell_style() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let mut sync = sync_for(&path);
    let records = vec![
        RosterRecord::new(Some(1), "García López, Ana", Some(8.5)),
        RosterRecord::new(Some(2), "Pérez, Juan", None),
        RosterRecord::new(Some(3), "Gómez, Luis", Some(6.0)),
    ];

    let summary = sync.run(&records, "1er Trimestre", "TAREA 1").unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.skipped_without_score, 1);
    assert!(summary.write_failures.is_empty());

    assert_eq!(read_cell(&path, SHEET, "D10"), CellValue::Number(8.5));
    assert_eq!(read_cell(&path, SHEET, "D12"), CellValue::Number(6.0));
    assert_eq!(read_cell(&path, SHEET, "D11"), CellValue::Empty);
    assert_eq!(
        read_cell(&path, SHEET, "C10"),
        CellValue::Text("Ana García".to_string())
    );
    assert_eq!(
        read_cell(&path, "Resumen", "A1"),
        CellValue::Text("total".to_string())
    );

    let d10 = cell_xml(&path, "D10");
    assert!(d10.contains(" s=\""), "{d10}");
    assert!(d10.contains("<v>8.5</v>"), "{d10}");

    let backup = summary.backup_path.unwrap();
    assert_eq!(backup.parent(), path.parent());
    assert!(backup
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("notas 2B_backup_"));
    assert_eq!(read_cell(&backup, SHEET, "D10"), CellValue::Number(4.0));
}

#[test]
fn writes_insert_missing_cells_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let mut surface = WorkbookSurface::open(&path, SHEET).unwrap();

    let report = surface
        .write_cells(&[
            CellWrite {
                cell: CellRef::new(11, 6),
                value: 7.0,
            },
            CellWrite {
                cell: CellRef::new(40, 11),
                value: 3.25,
            },
        ])
        .unwrap();
    assert_eq!(report.written, 2);

    assert_eq!(read_cell(&path, SHEET, "F11"), CellValue::Number(7.0));
    assert_eq!(read_cell(&path, SHEET, "K40"), CellValue::Number(3.25));
    assert_eq!(
        read_cell(&path, SHEET, "C11"),
        CellValue::Text("Juan Pérez Ruiz".to_string())
    );
    let merges = surface.merged_blocks().unwrap();
    assert_eq!(merges.len(), 2);
}

#[test]
fn overwriting_a_formula_leaves_a_plain_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let mut surface = WorkbookSurface::open(&path, SHEET).unwrap();

    surface
        .write_cells(&[CellWrite {
            cell: CellRef::new(10, 5),
            value: 9.0,
        }])
        .unwrap();

    let e10 = cell_xml(&path, "E10");
    assert!(!e10.contains("<f>"), "{e10}");
    assert_eq!(read_cell(&path, SHEET, "E10"), CellValue::Number(9.0));
}

#[test]
fn empty_batch_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let before = std::fs::read(&path).unwrap();
    let mut surface = WorkbookSurface::open(&path, SHEET).unwrap();

    let report = surface.write_cells(&[]).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[cfg(unix)]
#[test]
fn writes_keep_the_workbook_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    let mut surface = WorkbookSurface::open(&path, SHEET).unwrap();

    surface
        .write_cells(&[CellWrite {
            cell: CellRef::new(10, 4),
            value: 8.5,
        }])
        .unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
    assert_eq!(read_cell(&path, SHEET, "D10"), CellValue::Number(8.5));
}
