use gradesync_core::{
    discover, CellRange, CellRef, GridSurface, LayoutError, LayoutOptions, SheetSnapshot,
};

fn options(activity_row: u32) -> LayoutOptions {
    LayoutOptions {
        activity_row,
        header_window: 2,
        ..LayoutOptions::default()
    }
}

fn snapshot(grid: &GridSurface) -> SheetSnapshot {
    let range: CellRange = "A1:Z50".parse().unwrap();
    SheetSnapshot::read(grid, &range).unwrap()
}

#[test]
fn single_block_with_synonym_labels() {
    let mut grid = GridSurface::new("eval");
    grid.set(CellRef::new(1, 4), "RESULTADO APRENDIZAJE 1");
    grid.set(CellRef::new(3, 4), "TAREA 1");
    grid.set(CellRef::new(3, 5), "Observaciones");
    grid.set(CellRef::new(3, 6), "ACTIVIDAD 2");

    let map = discover(&snapshot(&grid), &options(3)).unwrap();
    assert_eq!(map.periods().len(), 1);
    let period = &map.periods()[0];
    assert_eq!(period.label, "1er Trimestre");
    let activities: Vec<_> = period.activities().collect();
    assert_eq!(activities, vec![("TAREA 1", 4), ("TAREA 2", 6)]);
}

#[test]
fn merged_metadata_bounds_blocks() {
    let mut grid = GridSurface::new("eval").with_merge("D1:F1".parse().unwrap());
    let mut grid_plain_values = GridSurface::new("eval");
    for target in [&mut grid, &mut grid_plain_values] {
        target.set(CellRef::new(1, 4), "Resultado Aprendizaje 1");
        target.set(CellRef::new(3, 4), "tarea 1");
        target.set(CellRef::new(3, 6), "ACTIVIDAD2");
        // Outside the merged block; only the value scan lets it in.
        target.set(CellRef::new(3, 8), "TAREA 9");
    }

    let merged = discover(&snapshot(&grid), &options(3)).unwrap();
    assert_eq!(merged.resolve("1er Trimestre", "TAREA 2"), Some(6));
    assert_eq!(merged.resolve("1er Trimestre", "TAREA 9"), None);

    let scanned = discover(&snapshot(&grid_plain_values), &options(3)).unwrap();
    assert_eq!(scanned.resolve("1er Trimestre", "TAREA 9"), Some(8));
}

#[test]
fn blocks_are_labeled_by_position_and_empty_blocks_dropped() {
    let mut grid = GridSurface::new("eval");
    for (index, col) in [2u32, 4, 6, 8].iter().enumerate() {
        grid.set(
            CellRef::new(2, *col),
            format!("RESULTADO APRENDIZAJE {}", index + 1).as_str(),
        );
    }
    // First block (cols 2-3) has no activities.
    grid.set(CellRef::new(3, 4), "TAREA 1");
    grid.set(CellRef::new(3, 6), "TAREA 1");
    grid.set(CellRef::new(3, 8), "TAREA 1");
    grid.set(CellRef::new(3, 9), "TAREA 2");

    let map = discover(&snapshot(&grid), &options(3)).unwrap();
    let labels: Vec<&str> = map.periods().iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["2do Trimestre", "3er Trimestre", "4to Trimestre"]);
    assert_eq!(map.resolve("4to Trimestre", "TAREA 2"), Some(9));
    assert_eq!(map.resolve("1er Trimestre", "TAREA 1"), None);
}

#[test]
fn repeated_label_in_a_block_keeps_the_later_column() {
    let mut grid = GridSurface::new("eval");
    grid.set(CellRef::new(1, 1), "RESULTADO APRENDIZAJE");
    grid.set(CellRef::new(3, 2), "TAREA 1");
    grid.set(CellRef::new(3, 3), "ACTIVIDAD 1");

    let map = discover(&snapshot(&grid), &options(3)).unwrap();
    assert_eq!(map.resolve("1er Trimestre", "TAREA 1"), Some(3));
    assert_eq!(map.periods()[0].len(), 1);
}

#[test]
fn missing_header_names_the_header_step() {
    let mut grid = GridSurface::new("eval");
    grid.set(CellRef::new(1, 4), "NOTAS");
    grid.set(CellRef::new(3, 4), "TAREA 1");

    let err = discover(&snapshot(&grid), &options(3)).unwrap_err();
    assert!(matches!(err, LayoutError::NoHeaderBlock { .. }));
    assert!(err.to_string().starts_with("header detection"));
}

#[test]
fn header_outside_window_is_not_seen() {
    let mut grid = GridSurface::new("eval");
    grid.set(CellRef::new(1, 4), "RESULTADO APRENDIZAJE");
    grid.set(CellRef::new(9, 4), "TAREA 1");

    let err = discover(&snapshot(&grid), &options(9)).unwrap_err();
    assert!(matches!(
        err,
        LayoutError::NoHeaderBlock {
            first_row: 7,
            last_row: 8,
            ..
        }
    ));
}

#[test]
fn headers_without_activities_name_the_activity_step() {
    let mut grid = GridSurface::new("eval");
    grid.set(CellRef::new(2, 4), "RESULTADO APRENDIZAJE 1");
    grid.set(CellRef::new(4, 4), "TAREA 1");

    let err = discover(&snapshot(&grid), &options(3)).unwrap_err();
    assert!(matches!(
        err,
        LayoutError::NoActivities {
            activity_row: 3,
            blocks: 1,
            ..
        }
    ));
    assert!(err.to_string().starts_with("activity detection"));
}
