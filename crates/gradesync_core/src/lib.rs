//! Core domain logic for GradeSync.
//! Name reconciliation and sheet mapping live here; front ends only call in.

pub mod config;
pub mod layout;
pub mod logging;
pub mod model;
pub mod names;
pub mod roster;
pub mod service;
pub mod surface;

pub use config::{ConfigError, SyncConfig};
pub use layout::{discover, ActivityMap, LayoutError, LayoutOptions, Period};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cell::{CellRange, CellRef, CellValue};
pub use model::roster::{Assignment, Course, RemoteId, RosterRecord, Score, ScoreEntry, Student};
pub use names::matcher::{find_best_match, find_best_row, MatchPolicy, MatchResult};
pub use names::normalize::{normalize_name, CanonicalName};
pub use roster::{join_scores, CanvasClient, CanvasConfig, RosterError, RosterResult, RosterSource};
pub use service::{
    apply, reconcile, ApplyOutcome, DestinationLayout, GradeSync, PlannedWrite, ReconcileReport,
    SyncError, SyncResult, SyncSummary, WritePlan,
};
pub use surface::{
    CellWrite, CellWriteReport, GridSurface, RemoteSheetConfig, RemoteSheetSurface, SheetSnapshot,
    SurfaceError, SurfaceKind, TabularSurface, WorkbookSurface,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
