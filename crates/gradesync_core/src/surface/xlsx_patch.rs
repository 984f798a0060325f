//! In-place numeric cell patching for xlsx packages.
//!
//! # Responsibility
//! - Rewrite one worksheet part with new numeric cell values.
//! - Copy every other zip entry byte-for-byte.
//!
//! # Invariants
//! - Existing cell styles (`s`) are kept; type/metadata attributes are dropped
//!   because the cell becomes a plain number.
//! - Missing rows and cells are inserted in sheet order.
//! - When a formula cell is overwritten, `xl/calcChain.xml` (and references to
//!   it) is removed so spreadsheet apps rebuild the chain on open.
//! - Overwriting the anchor cell of a shared formula fails the whole batch.
//! - The original file is replaced atomically via a sibling temp file that
//!   takes over the original's permissions.

use super::{CellWrite, SurfaceError, SurfaceResult};
use crate::model::cell::CellRef;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

type PendingCells = BTreeMap<u32, BTreeMap<u32, f64>>;

/// Outcome of one package rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PatchStats {
    pub worksheet_part: String,
    pub cells: usize,
    pub removed_formulas: bool,
}

fn workbook_err(context: &str, err: impl Display) -> SurfaceError {
    SurfaceError::Workbook(format!("{context}: {err}"))
}

/// Writes `writes` into `sheet_name` of the workbook at `path`.
pub(crate) fn patch_workbook_cells(
    path: &Path,
    sheet_name: &str,
    writes: &[CellWrite],
) -> SurfaceResult<PatchStats> {
    let file = File::open(path)?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|err| workbook_err("open package", err))?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
    let rel_id = find_sheet_rel_id(&workbook_xml, sheet_name)?
        .ok_or_else(|| SurfaceError::SheetNotFound(sheet_name.to_string()))?;
    let target = find_relationship_target(&rels_xml, &rel_id)?.ok_or_else(|| {
        SurfaceError::Workbook(format!("relationship `{rel_id}` for sheet `{sheet_name}` is missing"))
    })?;
    let worksheet_part = resolve_part(&target);

    let mut pending: PendingCells = BTreeMap::new();
    for write in writes {
        pending
            .entry(write.cell.row)
            .or_default()
            .insert(write.cell.col, write.value);
    }
    let cells = pending.values().map(BTreeMap::len).sum();

    let sheet_xml = read_part(&mut archive, &worksheet_part)?;
    let (patched_sheet, removed_formulas) = patch_sheet_xml(&sheet_xml, pending)?;

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = ZipWriter::new(temp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|err| workbook_err("read package entry", err))?;
            let name = entry.name().to_string();

            let replacement = if name == worksheet_part {
                Some(patched_sheet.clone())
            } else if removed_formulas && name == CALC_CHAIN_PART {
                continue;
            } else if removed_formulas && (name == CONTENT_TYPES_PART || name == WORKBOOK_RELS_PART) {
                let mut original = Vec::new();
                entry.read_to_end(&mut original)?;
                let (element, attribute): (&[u8], &[u8]) = if name == CONTENT_TYPES_PART {
                    (b"Override", b"PartName")
                } else {
                    (b"Relationship", b"Target")
                };
                Some(drop_elements_referencing(
                    &original,
                    element,
                    attribute,
                    "calcChain.xml",
                )?)
            } else {
                None
            };

            match replacement {
                Some(bytes) => {
                    writer
                        .start_file(name.as_str(), options)
                        .map_err(|err| workbook_err("write package entry", err))?;
                    writer.write_all(&bytes)?;
                }
                None => writer
                    .raw_copy_file(entry)
                    .map_err(|err| workbook_err("copy package entry", err))?,
            }
        }
        writer
            .finish()
            .map_err(|err| workbook_err("finish package", err))?;
    }
    drop(archive);
    // Temp files are created 0600; keep the workbook's own mode.
    let permissions = std::fs::metadata(path)?.permissions();
    std::fs::set_permissions(temp.path(), permissions)?;
    temp.persist(path).map_err(|err| SurfaceError::Io(err.error))?;

    Ok(PatchStats {
        worksheet_part,
        cells,
        removed_formulas,
    })
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> SurfaceResult<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|err| workbook_err(&format!("missing part `{name}`"), err))?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Resolves a workbook relationship target to a zip entry name.
fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> SurfaceResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|err| workbook_err("xml attribute", err))?;
        if local_name(attr.key.as_ref()) == key {
            let value = attr
                .unescape_value()
                .map_err(|err| workbook_err("xml attribute", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn find_sheet_rel_id(workbook_xml: &[u8], sheet_name: &str) -> SurfaceResult<Option<String>> {
    let mut reader = Reader::from_reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|err| workbook_err("parse workbook.xml", err))?
        {
            Event::Eof => return Ok(None),
            Event::Start(ref e) | Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheet" => {
                if attr_value(e, b"name")?.as_deref() == Some(sheet_name) {
                    return attr_value(e, b"id");
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

fn find_relationship_target(rels_xml: &[u8], rel_id: &str) -> SurfaceResult<Option<String>> {
    let mut reader = Reader::from_reader(rels_xml);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|err| workbook_err("parse workbook rels", err))?
        {
            Event::Eof => return Ok(None),
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                if attr_value(e, b"Id")?.as_deref() == Some(rel_id) {
                    return attr_value(e, b"Target");
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Removes empty `element`s whose `attribute` ends with `suffix`.
fn drop_elements_referencing(
    xml: &[u8],
    element: &[u8],
    attribute: &[u8],
    suffix: &str,
) -> SurfaceResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| workbook_err("parse package xml", err))?;
        match &event {
            Event::Eof => break,
            Event::Empty(e) if local_name(e.name().as_ref()) == element => {
                let references = attr_value(e, attribute)?
                    .is_some_and(|value| value.ends_with(suffix));
                if !references {
                    write_event(&mut writer, event.borrow())?;
                }
            }
            _ => write_event(&mut writer, event.borrow())?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> SurfaceResult<()> {
    writer
        .write_event(event)
        .map_err(|err| workbook_err("write xml", err))
}

fn prefixed(prefix: &str, local: &str) -> String {
    format!("{prefix}{local}")
}

fn element_prefix(element: &BytesStart<'_>) -> String {
    element
        .name()
        .prefix()
        .map(|prefix| format!("{}:", String::from_utf8_lossy(prefix.as_ref())))
        .unwrap_or_default()
}

fn write_new_cell(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    template: Option<&BytesStart<'_>>,
    cell: CellRef,
    value: f64,
) -> SurfaceResult<()> {
    let name = prefixed(prefix, "c");
    let mut start = BytesStart::new(name.as_str());
    let reference = cell.to_string();
    start.push_attribute(("r", reference.as_str()));
    if let Some(template) = template {
        for attr in template.attributes() {
            let attr = attr.map_err(|err| workbook_err("xml attribute", err))?;
            // Keep style and unknown attributes; drop ref/type/metadata.
            if matches!(local_name(attr.key.as_ref()), b"r" | b"t" | b"cm" | b"vm") {
                continue;
            }
            start.push_attribute(attr);
        }
    }
    write_event(writer, Event::Start(start))?;
    let value_name = prefixed(prefix, "v");
    write_event(writer, Event::Start(BytesStart::new(value_name.as_str())))?;
    let text = value.to_string();
    write_event(writer, Event::Text(BytesText::new(&text)))?;
    write_event(writer, Event::End(BytesEnd::new(value_name.as_str())))?;
    write_event(writer, Event::End(BytesEnd::new(name.as_str())))
}

fn write_cells_before(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    row: u32,
    cells: &mut BTreeMap<u32, f64>,
    before_col: Option<u32>,
) -> SurfaceResult<()> {
    let cols: Vec<u32> = cells
        .keys()
        .copied()
        .filter(|col| before_col.map_or(true, |limit| *col < limit))
        .collect();
    for col in cols {
        if let Some(value) = cells.remove(&col) {
            write_new_cell(writer, prefix, None, CellRef::new(row, col), value)?;
        }
    }
    Ok(())
}

fn write_rows_before(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    pending: &mut PendingCells,
    before_row: Option<u32>,
) -> SurfaceResult<()> {
    let rows: Vec<u32> = pending
        .keys()
        .copied()
        .filter(|row| before_row.map_or(true, |limit| *row < limit))
        .collect();
    let row_name = prefixed(prefix, "row");
    for row in rows {
        let Some(mut cells) = pending.remove(&row) else {
            continue;
        };
        let mut start = BytesStart::new(row_name.as_str());
        let reference = row.to_string();
        start.push_attribute(("r", reference.as_str()));
        write_event(writer, Event::Start(start))?;
        write_cells_before(writer, prefix, row, &mut cells, None)?;
        write_event(writer, Event::End(BytesEnd::new(row_name.as_str())))?;
    }
    Ok(())
}

/// Streams worksheet XML, replacing/inserting the pending cells.
///
/// Returns the new XML and whether any overwritten cell carried a formula.
pub(crate) fn patch_sheet_xml(xml: &[u8], mut pending: PendingCells) -> SurfaceResult<(Vec<u8>, bool)> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut prefix = String::new();
    let mut in_sheet_data = false;
    let mut saw_sheet_data = false;
    // Row currently open, its number, and the cells still to place in it.
    let mut open_row: Option<(u32, BTreeMap<u32, f64>)> = None;
    let mut last_row: u32 = 0;
    // Depth inside a replaced `<c>` whose children are being discarded.
    let mut skip_depth: usize = 0;
    let mut removed_formulas = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| workbook_err("parse worksheet", err))?;

        if skip_depth > 0 {
            match &event {
                Event::Start(e) => {
                    if local_name(e.name().as_ref()) == b"f" {
                        reject_shared_formula_master(e)?;
                        removed_formulas = true;
                    }
                    skip_depth += 1;
                }
                Event::Empty(e) if local_name(e.name().as_ref()) == b"f" => {
                    removed_formulas = true;
                }
                Event::End(_) => skip_depth -= 1,
                Event::Eof => {
                    return Err(SurfaceError::Workbook(
                        "worksheet xml ended inside a cell".to_string(),
                    ))
                }
                _ => {}
            }
            buf.clear();
            continue;
        }

        match &event {
            Event::Eof => break,
            Event::Start(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                prefix = element_prefix(e);
                in_sheet_data = true;
                saw_sheet_data = true;
                write_event(&mut writer, event.borrow())?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                prefix = element_prefix(e);
                saw_sheet_data = true;
                write_event(&mut writer, Event::Start(e.to_owned()))?;
                write_rows_before(&mut writer, &prefix, &mut pending, None)?;
                let name = prefixed(&prefix, "sheetData");
                write_event(&mut writer, Event::End(BytesEnd::new(name.as_str())))?;
            }
            Event::End(e) if in_sheet_data && local_name(e.name().as_ref()) == b"sheetData" => {
                write_rows_before(&mut writer, &prefix, &mut pending, None)?;
                in_sheet_data = false;
                write_event(&mut writer, event.borrow())?;
            }
            Event::Start(e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let row = row_number(e, last_row)?;
                last_row = row;
                write_rows_before(&mut writer, &prefix, &mut pending, Some(row))?;
                open_row = Some((row, pending.remove(&row).unwrap_or_default()));
                write_event(&mut writer, event.borrow())?;
            }
            Event::Empty(e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let row = row_number(e, last_row)?;
                last_row = row;
                write_rows_before(&mut writer, &prefix, &mut pending, Some(row))?;
                match pending.remove(&row) {
                    Some(mut cells) => {
                        write_event(&mut writer, Event::Start(e.to_owned()))?;
                        write_cells_before(&mut writer, &prefix, row, &mut cells, None)?;
                        let name = prefixed(&prefix, "row");
                        write_event(&mut writer, Event::End(BytesEnd::new(name.as_str())))?;
                    }
                    None => write_event(&mut writer, event.borrow())?,
                }
            }
            Event::End(e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                if let Some((row, mut cells)) = open_row.take() {
                    write_cells_before(&mut writer, &prefix, row, &mut cells, None)?;
                }
                write_event(&mut writer, event.borrow())?;
            }
            Event::Start(e) | Event::Empty(e)
                if open_row.is_some() && local_name(e.name().as_ref()) == b"c" =>
            {
                let is_start = matches!(event, Event::Start(_));
                let reference = attr_value(e, b"r")?;
                let cell = match reference.as_deref().map(str::parse::<CellRef>) {
                    Some(Ok(cell)) => cell,
                    // Cells without a usable reference are passed through untouched.
                    _ => {
                        write_event(&mut writer, event.borrow())?;
                        buf.clear();
                        continue;
                    }
                };
                let replacement = match open_row.as_mut() {
                    Some((row, cells)) => {
                        write_cells_before(&mut writer, &prefix, *row, cells, Some(cell.col))?;
                        cells.remove(&cell.col)
                    }
                    None => None,
                };
                match replacement {
                    Some(value) => {
                        let template = e.to_owned();
                        write_new_cell(&mut writer, &prefix, Some(&template), cell, value)?;
                        if is_start {
                            skip_depth = 1;
                        }
                    }
                    None => write_event(&mut writer, event.borrow())?,
                }
            }
            _ => write_event(&mut writer, event.borrow())?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(SurfaceError::Workbook(
            "worksheet xml has no <sheetData> section".to_string(),
        ));
    }
    Ok((writer.into_inner(), removed_formulas))
}

/// Fails on the anchor of a shared formula: its followers only carry `si`
/// and would be left without a definition.
fn reject_shared_formula_master(formula: &BytesStart<'_>) -> SurfaceResult<()> {
    let shared = attr_value(formula, b"t")?.as_deref() == Some("shared");
    match attr_value(formula, b"ref")? {
        Some(range) if shared => Err(SurfaceError::Workbook(format!(
            "cell anchors shared formula over {range}; overwriting it would orphan the other cells"
        ))),
        _ => Ok(()),
    }
}

fn row_number(element: &BytesStart<'_>, previous: u32) -> SurfaceResult<u32> {
    match attr_value(element, b"r")? {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|err| workbook_err(&format!("row number `{raw}`"), err)),
        None => Ok(previous + 1),
    }
}
