//! Write-plan execution.
//!
//! # Responsibility
//! - Back up file-backed destinations before the first mutation.
//! - Hand the plan to the surface in one batch.
//!
//! # Invariants
//! - An empty plan touches nothing: no backup, no write.
//! - A failed backup aborts before any cell is written.
//! - Backups never overwrite an earlier backup.

use super::reconcile::WritePlan;
use super::{SyncError, SyncResult};
use crate::surface::{CellWriteFailure, TabularSurface};
use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const MAX_BACKUP_ATTEMPTS: u32 = 100;

/// Result of applying one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Cells that landed.
    pub written: usize,
    pub backup_path: Option<PathBuf>,
    pub failures: Vec<CellWriteFailure>,
}

/// `{stem}_backup_{YYYYMMDD_HHMMSS}{ext}` next to `original`.
pub fn backup_path_for<Tz: TimeZone>(original: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let stem = original
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = original
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{stem}_backup_{}{extension}", at.format("%Y%m%d_%H%M%S"));
    original.with_file_name(name)
}

/// Copies `original` to its timestamped backup path.
///
/// An existing backup is never overwritten: a second run within the same
/// second gets `_1`, `_2`, ... appended to the stem.
pub fn create_backup(original: &Path) -> SyncResult<PathBuf> {
    let base = backup_path_for(original, &Local::now());
    let mut last_target = base.clone();
    for attempt in 0..MAX_BACKUP_ATTEMPTS {
        let target = numbered(&base, attempt);
        match copy_to_new_file(original, &target) {
            Ok(()) => {
                info!(
                    "event=backup module=service status=ok source={} backup={}",
                    original.display(),
                    target.display()
                );
                return Ok(target);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                last_target = target;
            }
            Err(err) => return Err(backup_failed(original, target, err)),
        }
    }
    let err = io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{MAX_BACKUP_ATTEMPTS} backups already exist for this second"),
    );
    Err(backup_failed(original, last_target, err))
}

fn numbered(base: &Path, attempt: u32) -> PathBuf {
    if attempt == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = base
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    base.with_file_name(format!("{stem}_{attempt}{extension}"))
}

/// Copies into a file that must not exist yet; a partial copy is removed.
fn copy_to_new_file(original: &Path, target: &Path) -> io::Result<()> {
    let mut source = File::open(original)?;
    let mut destination = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)?;
    let copied = io::copy(&mut source, &mut destination).and_then(|_| destination.sync_all());
    if let Err(err) = copied {
        drop(destination);
        let _ = fs::remove_file(target);
        return Err(err);
    }
    Ok(())
}

fn backup_failed(original: &Path, target: PathBuf, err: io::Error) -> SyncError {
    warn!(
        "event=backup module=service status=error source={} backup={} error={}",
        original.display(),
        target.display(),
        err
    );
    SyncError::Backup {
        path: target,
        source: err,
    }
}

/// Commits `plan` to `surface`.
///
/// # Errors
/// - `Backup` when a file-backed destination cannot be copied first.
/// - `Connectivity`/`Destination` when the surface rejects the batch.
pub fn apply<S: TabularSurface + ?Sized>(surface: &mut S, plan: WritePlan) -> SyncResult<ApplyOutcome> {
    if plan.is_empty() {
        info!(
            "event=apply module=service status=noop destination={}",
            surface.describe()
        );
        return Ok(ApplyOutcome::default());
    }

    let backup_path = match surface.backing_file() {
        Some(path) => Some(create_backup(path)?),
        None => None,
    };

    let writes = plan.cell_writes();
    let report = surface.write_cells(&writes)?;
    for failure in &report.failures {
        warn!(
            "event=apply module=service status=cell_failed destination={} cell={} error={}",
            surface.describe(),
            failure.cell,
            failure.message
        );
    }
    info!(
        "event=apply module=service status=ok destination={} kind={} planned={} written={} failed={}",
        surface.describe(),
        surface.kind().as_str(),
        writes.len(),
        report.written,
        report.failures.len()
    );
    Ok(ApplyOutcome {
        written: report.written,
        backup_path,
        failures: report.failures,
    })
}
