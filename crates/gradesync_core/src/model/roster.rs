//! Roster-side records.
//!
//! # Responsibility
//! - Define the rows produced by the roster collaborator and checkpoint files.
//! - Keep score coercion rules in one place.
//!
//! # Invariants
//! - A score is usable only when it coerces to a finite number.
//! - Records are consumed read-only by reconciliation.

use serde::{Deserialize, Serialize};

/// Remote identifier for courses, assignments and students.
pub type RemoteId = u64;

/// Raw score as it appears in roster payloads and checkpoint files.
///
/// Services return numbers, but hand-edited checkpoints and some exports carry
/// numeric strings, so both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl Score {
    /// Returns the numeric value when the score is usable for writing.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One `{student, score}` row ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRecord {
    /// Opaque roster identity; serialized as `user_id` in checkpoints.
    #[serde(rename = "user_id", default)]
    pub identity: Option<RemoteId>,
    /// Free-text name as the roster displays it (often `Last, First`).
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub score: Option<Score>,
}

impl RosterRecord {
    pub fn new(
        identity: Option<RemoteId>,
        display_name: impl Into<String>,
        score: Option<f64>,
    ) -> Self {
        Self {
            identity,
            display_name: Some(display_name.into()),
            score: score.map(Score::Number),
        }
    }

    /// Trimmed non-empty display name.
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Numeric score, `None` for missing or non-numeric values.
    pub fn numeric_score(&self) -> Option<f64> {
        self.score.as_ref().and_then(Score::as_number)
    }
}

/// Active course visible to the roster account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: RemoteId,
    pub name: String,
}

/// Gradable activity of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: RemoteId,
    pub name: String,
}

/// One enrolled student as listed by the roster service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: RemoteId,
    pub name: String,
}

/// One submission score as listed by the roster service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "user_id")]
    pub student_id: RemoteId,
    #[serde(default)]
    pub score: Option<Score>,
}
