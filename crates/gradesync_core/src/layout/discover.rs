//! Header-block and activity-column discovery.
//!
//! # Responsibility
//! - Locate grouped header blocks (one per grading period).
//! - Locate labeled activity columns inside each block.
//!
//! # Invariants
//! - True merge metadata wins when present; otherwise the label scan over the
//!   header window approximates merged headers from plain values.
//! - Blocks are ordered by start column and span to the next block's start
//!   (exclusive) or the grid's last column.
//! - A block index is kept even when the block is dropped for having no
//!   activities, so period labels stay tied to sheet position.

use super::activity_map::{ActivityMap, Period};
use crate::model::cell::CellRange;
use crate::surface::SheetSnapshot;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static ACTIVITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(TAREA|ACTIVIDAD)\s*(\d+)").expect("valid activity regex"));

/// Where and how to look for periods and activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Text contained (case-insensitively) in every period header.
    pub header_label: String,
    /// 1-based row holding activity labels.
    pub activity_row: u32,
    /// Rows directly above `activity_row` scanned for header text.
    pub header_window: u32,
    /// Names of the first periods, in sheet order.
    pub period_labels: Vec<String>,
    /// Label for periods past `period_labels`; `{n}` is the 1-based index.
    pub ordinal_template: String,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            header_label: "RESULTADO APRENDIZAJE".to_string(),
            activity_row: 9,
            header_window: 4,
            period_labels: vec![
                "1er Trimestre".to_string(),
                "2do Trimestre".to_string(),
                "3er Trimestre".to_string(),
            ],
            ordinal_template: "{n}to Trimestre".to_string(),
        }
    }
}

impl LayoutOptions {
    /// First row of the header scan window.
    pub fn window_start(&self) -> u32 {
        self.activity_row.saturating_sub(self.header_window).max(1)
    }

    fn period_label(&self, index: usize) -> String {
        match self.period_labels.get(index) {
            Some(label) => label.clone(),
            None => self.ordinal_template.replace("{n}", &(index + 1).to_string()),
        }
    }
}

/// Layout discovery failures; the two variants need different fixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Header detection found nothing: wrong sheet or wrong label.
    NoHeaderBlock {
        label: String,
        first_row: u32,
        last_row: u32,
    },
    /// Headers found, but no activity labels under them: wrong activity row.
    NoActivities {
        label: String,
        activity_row: u32,
        blocks: usize,
    },
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHeaderBlock {
                label,
                first_row,
                last_row,
            } => write!(
                f,
                "header detection: no header containing `{label}` found in rows {first_row}-{last_row}"
            ),
            Self::NoActivities {
                label,
                activity_row,
                blocks,
            } => write!(
                f,
                "activity detection: {blocks} `{label}` header block(s) found but no 'TAREA N'/'ACTIVIDAD N' labels in row {activity_row}"
            ),
        }
    }
}

impl Error for LayoutError {}

/// Column span of one header block, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderBlock {
    first_col: u32,
    last_col: u32,
}

/// Builds the activity map of `snapshot`.
///
/// # Errors
/// - `NoHeaderBlock` when no header contains `options.header_label`.
/// - `NoActivities` when every found block is empty.
pub fn discover(snapshot: &SheetSnapshot, options: &LayoutOptions) -> Result<ActivityMap, LayoutError> {
    let needle = options.header_label.to_lowercase();
    let mut blocks = merged_header_blocks(snapshot, options, &needle);
    let source = if blocks.is_empty() {
        blocks = scanned_header_blocks(snapshot, options, &needle);
        "scan"
    } else {
        "merged"
    };

    if blocks.is_empty() {
        warn!(
            "event=layout_discover module=layout status=error step=header label={} rows={}-{}",
            options.header_label,
            options.window_start(),
            options.activity_row.saturating_sub(1)
        );
        return Err(LayoutError::NoHeaderBlock {
            label: options.header_label.clone(),
            first_row: options.window_start(),
            last_row: options.activity_row.saturating_sub(1),
        });
    }
    debug!(
        "event=layout_discover module=layout status=blocks source={} count={}",
        source,
        blocks.len()
    );

    let mut periods = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        let mut period = Period::new(options.period_label(index));
        for col in block.first_col..=block.last_col {
            let raw = snapshot.cell_at(options.activity_row, col).to_display();
            if let Some(captures) = ACTIVITY_RE.captures(&raw) {
                period.insert(format!("TAREA {}", &captures[2]), col);
            }
        }
        if period.is_empty() {
            debug!(
                "event=layout_discover module=layout status=skip_block index={} cols={}-{}",
                index, block.first_col, block.last_col
            );
            continue;
        }
        periods.push(period);
    }

    if periods.is_empty() {
        warn!(
            "event=layout_discover module=layout status=error step=activities label={} activity_row={} blocks={}",
            options.header_label,
            options.activity_row,
            blocks.len()
        );
        return Err(LayoutError::NoActivities {
            label: options.header_label.clone(),
            activity_row: options.activity_row,
            blocks: blocks.len(),
        });
    }

    let map = ActivityMap::from_periods(periods);
    info!(
        "event=layout_discover module=layout status=ok source={} periods={}",
        source,
        map.periods().len()
    );
    Ok(map)
}

/// Blocks from true merge metadata: merged ranges above the activity row whose
/// top-left cell carries the header label.
fn merged_header_blocks(
    snapshot: &SheetSnapshot,
    options: &LayoutOptions,
    needle: &str,
) -> Vec<HeaderBlock> {
    let mut by_start: BTreeMap<u32, HeaderBlock> = BTreeMap::new();
    for range in snapshot.merged_blocks() {
        if range.start.row >= options.activity_row || !header_matches(snapshot, range, needle) {
            continue;
        }
        by_start.entry(range.start.col).or_insert(HeaderBlock {
            first_col: range.start.col,
            last_col: range.end.col,
        });
    }
    by_start.into_values().collect()
}

fn header_matches(snapshot: &SheetSnapshot, range: &CellRange, needle: &str) -> bool {
    snapshot
        .cell_at(range.start.row, range.start.col)
        .to_display()
        .to_lowercase()
        .contains(needle)
}

/// Blocks approximated from plain values: each distinct column where the label
/// appears in the header window starts a block.
fn scanned_header_blocks(
    snapshot: &SheetSnapshot,
    options: &LayoutOptions,
    needle: &str,
) -> Vec<HeaderBlock> {
    let last_col = snapshot.last_column();
    let first_col = snapshot.origin().col;
    let mut starts: Vec<u32> = Vec::new();
    for row in options.window_start()..options.activity_row {
        for col in first_col..=last_col {
            let text = snapshot.cell_at(row, col).to_display().to_lowercase();
            if text.contains(needle) && !starts.contains(&col) {
                starts.push(col);
            }
        }
    }
    starts.sort_unstable();

    starts
        .iter()
        .enumerate()
        .map(|(index, start)| HeaderBlock {
            first_col: *start,
            last_col: starts
                .get(index + 1)
                .map_or(last_col, |next| next.saturating_sub(1)),
        })
        .collect()
}
