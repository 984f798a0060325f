//! Reconciliation of roster records against a destination sheet.
//!
//! # Responsibility
//! - Resolve the target column from a freshly discovered activity map.
//! - Match every usable record to a destination row.
//! - Produce the write plan plus per-record outcomes.
//!
//! # Invariants
//! - The destination is read exactly once per call; nothing is cached.
//! - Unmatched names and records without a score are outcomes, never errors,
//!   and stay distinguishable in the report.

use super::{SyncError, SyncResult};
use crate::layout::{discover, ActivityMap, LayoutOptions};
use crate::model::cell::{column_letters, format_number, CellRange, CellRef, CellValue};
use crate::model::roster::RosterRecord;
use crate::names::matcher::{cell_candidates, find_best_match, MatchPolicy};
use crate::surface::{CellWrite, SheetSnapshot, TabularSurface};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Where the student list and grade grid live in the destination sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationLayout {
    /// Region read once per operation.
    pub read_range: CellRange,
    /// Column holding student names.
    pub name_column: u32,
    pub first_student_row: u32,
    pub last_student_row: u32,
    pub options: LayoutOptions,
}

impl Default for DestinationLayout {
    fn default() -> Self {
        Self {
            read_range: CellRange::new(CellRef::new(1, 1), CellRef::new(50, 26)),
            name_column: 3,
            first_student_row: 10,
            last_student_row: 44,
            options: LayoutOptions::default(),
        }
    }
}

impl DestinationLayout {
    /// `(row, name)` pairs of the student range; blank cells are skipped.
    pub fn students(&self, snapshot: &SheetSnapshot) -> Vec<(u32, String)> {
        (self.first_student_row..=self.last_student_row)
            .filter_map(|row| {
                let name = snapshot.text_at(row, self.name_column)?.trim();
                (!name.is_empty()).then(|| (row, name.to_string()))
            })
            .collect()
    }
}

/// One cell the plan will overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    /// Name as the roster spells it.
    pub student: String,
    /// Name found in the destination row.
    pub matched_name: String,
    pub value: f64,
    /// Value of the cell when the destination was read.
    pub previous: CellValue,
}

/// Cell-ordered set of pending writes, consumed once by `apply`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    entries: BTreeMap<CellRef, PlannedWrite>,
}

impl WritePlan {
    /// Adds a write; a second write to the same cell replaces the first.
    pub fn insert(&mut self, cell: CellRef, write: PlannedWrite) -> Option<PlannedWrite> {
        self.entries.insert(cell, write)
    }

    pub fn get(&self, cell: CellRef) -> Option<&PlannedWrite> {
        self.entries.get(&cell)
    }

    pub fn value_at(&self, cell: CellRef) -> Option<f64> {
        self.get(cell).map(|write| write.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellRef, &PlannedWrite)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cell_writes(&self) -> Vec<CellWrite> {
        self.entries
            .iter()
            .map(|(cell, write)| CellWrite {
                cell: *cell,
                value: write.value,
            })
            .collect()
    }
}

/// Everything one reconcile pass decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub period: String,
    pub activity: String,
    pub column: u32,
    pub plan: WritePlan,
    /// Every record seen, whatever its outcome.
    pub processed: usize,
    /// Roster names with no acceptable destination row, in input order.
    pub not_found_names: Vec<String>,
    /// Named records whose score is missing or not numeric.
    pub skipped_without_score: usize,
    /// Records with no usable name.
    pub skipped_unnamed: usize,
    pub activity_map: ActivityMap,
}

impl ReconcileReport {
    /// Plain-text before/after table followed by the not-found list.
    pub fn render_report(&self) -> String {
        let mut lines = vec![format!(
            "{} / {} -> column {}",
            self.period,
            self.activity,
            column_letters(self.column)
        )];
        lines.push("cell | student | matched | before -> after".to_string());
        for (cell, write) in self.plan.iter() {
            let before = if write.previous.is_empty() {
                "-".to_string()
            } else {
                write.previous.to_display()
            };
            lines.push(format!(
                "{cell} | {} | {} | {before} -> {}",
                write.student,
                write.matched_name,
                format_number(write.value)
            ));
        }
        lines.push(format!(
            "processed={} planned={} not_found={} without_score={}",
            self.processed,
            self.plan.len(),
            self.not_found_names.len(),
            self.skipped_without_score
        ));
        if !self.not_found_names.is_empty() {
            lines.push(format!("not found ({}):", self.not_found_names.len()));
            lines.extend(self.not_found_names.iter().map(|name| format!("  {name}")));
        }
        lines.join("\n")
    }
}

/// Builds the write plan for `(period, activity)` from a fresh read.
///
/// # Errors
/// - `Connectivity`/`Destination` when the sheet cannot be read.
/// - `Layout` when no header block or no activity is found.
/// - `Mapping` when the pair is absent from the discovered map.
pub fn reconcile<S: TabularSurface + ?Sized>(
    records: &[RosterRecord],
    surface: &S,
    layout: &DestinationLayout,
    policy: &MatchPolicy,
    period: &str,
    activity: &str,
) -> SyncResult<ReconcileReport> {
    let snapshot = SheetSnapshot::read(surface, &layout.read_range)?;
    let activity_map = discover(&snapshot, &layout.options)?;
    let Some(column) = activity_map.resolve(period, activity) else {
        warn!(
            "event=reconcile module=service status=error step=mapping destination={} period={} activity={}",
            surface.describe(),
            period,
            activity
        );
        return Err(SyncError::Mapping {
            period: period.to_string(),
            activity: activity.to_string(),
        });
    };

    let candidates: Vec<(u32, Option<&str>)> = cell_candidates(
        (layout.first_student_row..=layout.last_student_row)
            .map(|row| (row, snapshot.cell_at(row, layout.name_column))),
    )
    .collect();

    let mut report = ReconcileReport {
        period: period.to_string(),
        activity: activity.to_string(),
        column,
        plan: WritePlan::default(),
        processed: 0,
        not_found_names: Vec::new(),
        skipped_without_score: 0,
        skipped_unnamed: 0,
        activity_map,
    };

    for record in records {
        report.processed += 1;
        let Some(name) = record.name() else {
            report.skipped_unnamed += 1;
            continue;
        };
        let Some(value) = record.numeric_score() else {
            debug!(
                "event=reconcile module=service status=skip reason=no_score student={}",
                name
            );
            report.skipped_without_score += 1;
            continue;
        };

        let found = find_best_match(name, candidates.iter().copied(), policy);
        match (found.row, found.matched_name) {
            (Some(row), Some(matched_name)) => {
                let cell = CellRef::new(row, column);
                let previous = snapshot.cell_at(row, column).clone();
                let replaced = report.plan.insert(
                    cell,
                    PlannedWrite {
                        student: name.to_string(),
                        matched_name,
                        value,
                        previous,
                    },
                );
                if let Some(earlier) = replaced {
                    warn!(
                        "event=reconcile module=service status=collision cell={} replaced={} by={}",
                        cell, earlier.student, name
                    );
                }
            }
            _ => {
                warn!(
                    "event=reconcile module=service status=not_found student={} best_overlap={}",
                    name, found.score
                );
                report.not_found_names.push(name.to_string());
            }
        }
    }

    info!(
        "event=reconcile module=service status=ok destination={} period={} activity={} column={} processed={} planned={} not_found={} without_score={}",
        surface.describe(),
        period,
        activity,
        column_letters(column),
        report.processed,
        report.plan.len(),
        report.not_found_names.len(),
        report.skipped_without_score
    );
    Ok(report)
}
