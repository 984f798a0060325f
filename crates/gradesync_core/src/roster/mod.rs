//! Roster collaborator contracts.
//!
//! # Responsibility
//! - Describe the course/roster service the sync engine reads from.
//! - Join raw score rows with student names into `RosterRecord`s.
//!
//! # Invariants
//! - Students are listed by sortable name, ascending.
//! - Joined records keep score-row order; rows whose student is unknown are
//!   dropped because they cannot be matched by name.
//!
//! # See also
//! - `checkpoint` for the JSON files that decouple fetching from writing.

use crate::model::roster::{Assignment, Course, RemoteId, RosterRecord, ScoreEntry, Student};
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod canvas;
pub mod checkpoint;

pub use canvas::{CanvasClient, CanvasConfig};
pub use checkpoint::{
    fetch_scores_to_write, load_scores_to_write, load_students, save_scores_to_write,
    save_students,
};

pub type RosterResult<T> = Result<T, RosterError>;

/// Roster and checkpoint failures.
#[derive(Debug)]
pub enum RosterError {
    /// Transport failure, rejected credentials, or non-success status.
    Connectivity(String),
    /// Payload did not have the expected shape.
    Decode(String),
    /// Checkpoint file could not be read or written.
    Snapshot { path: PathBuf, message: String },
    /// A fetch or checkpoint yielded no rows.
    Empty(String),
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity(message) => write!(f, "roster service unreachable: {message}"),
            Self::Decode(message) => write!(f, "unexpected roster payload: {message}"),
            Self::Snapshot { path, message } => {
                write!(f, "checkpoint `{}`: {message}", path.display())
            }
            Self::Empty(what) => write!(f, "nothing to write: {what}"),
        }
    }
}

impl Error for RosterError {}

/// Read-only view of a course roster service.
pub trait RosterSource {
    fn list_active_courses(&self) -> RosterResult<Vec<Course>>;

    fn list_assignments(&self, course: RemoteId) -> RosterResult<Vec<Assignment>>;

    /// Enrolled students ordered by sortable name (`Last, First`), ascending.
    fn list_students(&self, course: RemoteId) -> RosterResult<Vec<Student>>;

    fn list_scores(&self, course: RemoteId, assignment: RemoteId) -> RosterResult<Vec<ScoreEntry>>;
}

/// Attaches student names to score rows.
pub fn join_scores(students: &[Student], scores: &[ScoreEntry]) -> Vec<RosterRecord> {
    let names: HashMap<RemoteId, &str> = students
        .iter()
        .map(|student| (student.id, student.name.as_str()))
        .collect();

    scores
        .iter()
        .filter_map(|entry| match names.get(&entry.student_id) {
            Some(name) => Some(RosterRecord {
                identity: Some(entry.student_id),
                display_name: Some((*name).to_string()),
                score: entry.score.clone(),
            }),
            None => {
                debug!(
                    "event=roster_join module=roster status=skip user_id={}",
                    entry.student_id
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::join_scores;
    use crate::model::roster::{Score, ScoreEntry, Student};

    #[test]
    fn join_keeps_score_order_and_drops_unknown_students() {
        let students = vec![
            Student {
                id: 1,
                name: "Alvarez, Ana".to_string(),
            },
            Student {
                id: 2,
                name: "Bravo, Beto".to_string(),
            },
        ];
        let scores = vec![
            ScoreEntry {
                student_id: 2,
                score: Some(Score::Number(9.0)),
            },
            ScoreEntry {
                student_id: 99,
                score: Some(Score::Number(1.0)),
            },
            ScoreEntry {
                student_id: 1,
                score: None,
            },
        ];

        let records = join_scores(&students, &scores);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name(), Some("Bravo, Beto"));
        assert_eq!(records[0].numeric_score(), Some(9.0));
        assert_eq!(records[1].identity, Some(1));
        assert_eq!(records[1].score, None);
    }
}
