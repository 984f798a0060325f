//! JSON checkpoints between the fetch and write phases.
//!
//! # Responsibility
//! - Persist the roster snapshot (`[{id, name}]`).
//! - Persist the scores-to-write list (`[{user_id, name, score}]`).
//!
//! # Invariants
//! - Files are pretty-printed UTF-8; names are written unescaped.
//! - An empty scores-to-write file is rejected on load.

use super::{join_scores, RosterError, RosterResult, RosterSource};
use crate::model::roster::{RemoteId, RosterRecord, Student};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

fn snapshot_err(path: &Path, err: impl std::fmt::Display) -> RosterError {
    RosterError::Snapshot {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RosterResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|err| snapshot_err(path, err))?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| snapshot_err(path, err))?;
    }
    fs::write(path, text).map_err(|err| snapshot_err(path, err))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RosterResult<T> {
    let text = fs::read_to_string(path).map_err(|err| snapshot_err(path, err))?;
    serde_json::from_str(&text).map_err(|err| snapshot_err(path, err))
}

pub fn save_students(path: &Path, students: &[Student]) -> RosterResult<()> {
    write_json(path, students)
}

pub fn load_students(path: &Path) -> RosterResult<Vec<Student>> {
    read_json(path)
}

pub fn save_scores_to_write(path: &Path, records: &[RosterRecord]) -> RosterResult<()> {
    write_json(path, records)
}

/// Loads the scores-to-write list.
///
/// # Errors
/// - `Snapshot` when the file is missing or malformed.
/// - `Empty` when it holds no records.
pub fn load_scores_to_write(path: &Path) -> RosterResult<Vec<RosterRecord>> {
    let records: Vec<RosterRecord> = read_json(path)?;
    if records.is_empty() {
        return Err(RosterError::Empty(format!(
            "`{}` holds no records",
            path.display()
        )));
    }
    Ok(records)
}

/// Runs the fetch phase: students, scores, join, and both checkpoints.
///
/// # Errors
/// - `Empty` when the course has no students or the assignment no scores.
pub fn fetch_scores_to_write<S: RosterSource + ?Sized>(
    source: &S,
    course: RemoteId,
    assignment: RemoteId,
    students_path: &Path,
    scores_path: &Path,
) -> RosterResult<Vec<RosterRecord>> {
    let students = source.list_students(course)?;
    if students.is_empty() {
        return Err(RosterError::Empty(format!("course {course} lists no students")));
    }
    let scores = source.list_scores(course, assignment)?;
    if scores.is_empty() {
        return Err(RosterError::Empty(format!(
            "assignment {assignment} has no submissions"
        )));
    }

    let records = join_scores(&students, &scores);
    save_students(students_path, &students)?;
    save_scores_to_write(scores_path, &records)?;
    info!(
        "event=roster_fetch module=roster status=ok course={} assignment={} students={} records={}",
        course,
        assignment,
        students.len(),
        records.len()
    );
    Ok(records)
}
