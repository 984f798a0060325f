//! Grade sync use-case services.
//!
//! # Responsibility
//! - Orchestrate layout discovery, matching and writing into one run.
//! - Separate abort-worthy failures (`SyncError`) from per-record outcomes.
//!
//! # Invariants
//! - The destination handle is owned by the service and passed explicitly;
//!   there is no process-wide client state.
//! - Every public operation re-reads the destination.

use crate::layout::{discover, ActivityMap, LayoutError};
use crate::model::roster::RosterRecord;
use crate::names::matcher::MatchPolicy;
use crate::roster::RosterError;
use crate::surface::{CellWriteFailure, SheetSnapshot, SurfaceError, TabularSurface};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod reconcile;
pub mod write;

pub use reconcile::{reconcile, DestinationLayout, PlannedWrite, ReconcileReport, WritePlan};
pub use write::{apply, backup_path_for, create_backup, ApplyOutcome};

pub type SyncResult<T> = Result<T, SyncError>;

/// Failures that abort a sync operation.
#[derive(Debug)]
pub enum SyncError {
    /// Roster service or remote sheet unreachable/unauthorized.
    Connectivity(String),
    /// Destination could not be read or written.
    Destination(SurfaceError),
    /// Header block or activities not found.
    Layout(LayoutError),
    /// Requested pair absent from a successfully built map.
    Mapping { period: String, activity: String },
    /// Backup copy of a file-backed destination failed; nothing was written.
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Checkpoint file unreadable, malformed, or empty.
    Snapshot(RosterError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity(message) => write!(f, "connectivity: {message}"),
            Self::Destination(err) => write!(f, "destination: {err}"),
            Self::Layout(err) => write!(f, "layout: {err}"),
            Self::Mapping { period, activity } => {
                write!(f, "mapping: activity `{activity}` not found in period `{period}`")
            }
            Self::Backup { path, source } => {
                write!(f, "backup to `{}` failed: {source}", path.display())
            }
            Self::Snapshot(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Destination(err) => Some(err),
            Self::Layout(err) => Some(err),
            Self::Backup { source, .. } => Some(source),
            Self::Snapshot(err) => Some(err),
            Self::Connectivity(_) | Self::Mapping { .. } => None,
        }
    }
}

impl From<SurfaceError> for SyncError {
    fn from(value: SurfaceError) -> Self {
        match value {
            SurfaceError::Connectivity(message) => Self::Connectivity(message),
            other => Self::Destination(other),
        }
    }
}

impl From<LayoutError> for SyncError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

impl From<RosterError> for SyncError {
    fn from(value: RosterError) -> Self {
        match value {
            RosterError::Connectivity(message) => Self::Connectivity(message),
            other => Self::Snapshot(other),
        }
    }
}

/// Outcome of a full reconcile + apply run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub processed: usize,
    pub written: usize,
    pub not_found: usize,
    pub not_found_names: Vec<String>,
    pub skipped_without_score: usize,
    pub backup_path: Option<PathBuf>,
    pub write_failures: Vec<CellWriteFailure>,
}

impl SyncSummary {
    fn from_parts(report: &ReconcileReport, outcome: ApplyOutcome) -> Self {
        Self {
            processed: report.processed,
            written: outcome.written,
            not_found: report.not_found_names.len(),
            not_found_names: report.not_found_names.clone(),
            skipped_without_score: report.skipped_without_score,
            backup_path: outcome.backup_path,
            write_failures: outcome.failures,
        }
    }
}

/// Sync service bound to one destination.
pub struct GradeSync<S: TabularSurface> {
    surface: S,
    layout: DestinationLayout,
    policy: MatchPolicy,
}

impl<S: TabularSurface> GradeSync<S> {
    pub fn new(surface: S, layout: DestinationLayout, policy: MatchPolicy) -> Self {
        Self {
            surface,
            layout,
            policy,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Destination handle, e.g. for out-of-band edits between runs.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn layout(&self) -> &DestinationLayout {
        &self.layout
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn snapshot(&self) -> SyncResult<SheetSnapshot> {
        Ok(SheetSnapshot::read(&self.surface, &self.layout.read_range)?)
    }

    /// Freshly discovered period/activity map, for selection lists.
    pub fn activity_map(&self) -> SyncResult<ActivityMap> {
        let snapshot = self.snapshot()?;
        Ok(discover(&snapshot, &self.layout.options)?)
    }

    /// Non-blank `(row, name)` entries of the student range.
    pub fn destination_students(&self) -> SyncResult<Vec<(u32, String)>> {
        let snapshot = self.snapshot()?;
        Ok(self.layout.students(&snapshot))
    }

    pub fn reconcile(
        &self,
        records: &[RosterRecord],
        period: &str,
        activity: &str,
    ) -> SyncResult<ReconcileReport> {
        reconcile(records, &self.surface, &self.layout, &self.policy, period, activity)
    }

    pub fn apply(&mut self, plan: WritePlan) -> SyncResult<ApplyOutcome> {
        apply(&mut self.surface, plan)
    }

    /// Reconciles and writes in one pass.
    pub fn run(
        &mut self,
        records: &[RosterRecord],
        period: &str,
        activity: &str,
    ) -> SyncResult<SyncSummary> {
        let mut report = self.reconcile(records, period, activity)?;
        let plan = std::mem::take(&mut report.plan);
        let outcome = self.apply(plan)?;
        let summary = SyncSummary::from_parts(&report, outcome);
        info!(
            "event=sync_run module=service status=ok destination={} processed={} written={} not_found={} failed={}",
            self.surface.describe(),
            summary.processed,
            summary.written,
            summary.not_found,
            summary.write_failures.len()
        );
        Ok(summary)
    }
}
