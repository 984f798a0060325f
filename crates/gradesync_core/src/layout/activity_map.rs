//! Period/activity column map.

use crate::model::cell::column_letters;
use serde::Serialize;

/// One grading period and the columns of its activities.
///
/// Activities keep discovery order (left to right); labels are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub label: String,
    activities: Vec<(String, u32)>,
}

impl Period {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            activities: Vec::new(),
        }
    }

    /// Records an activity column; a repeated label keeps its position and
    /// takes the later column.
    pub fn insert(&mut self, activity: impl Into<String>, col: u32) {
        let activity = activity.into();
        match self.activities.iter_mut().find(|(label, _)| *label == activity) {
            Some(entry) => entry.1 = col,
            None => self.activities.push((activity, col)),
        }
    }

    pub fn column(&self, activity: &str) -> Option<u32> {
        self.activities
            .iter()
            .find(|(label, _)| label == activity)
            .map(|(_, col)| *col)
    }

    pub fn activities(&self) -> impl Iterator<Item = (&str, u32)> {
        self.activities.iter().map(|(label, col)| (label.as_str(), *col))
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }
}

/// Periods ordered left to right by source column.
///
/// Built fresh from every destination load and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityMap {
    periods: Vec<Period>,
}

impl ActivityMap {
    pub(crate) fn from_periods(periods: Vec<Period>) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn period(&self, label: &str) -> Option<&Period> {
        self.periods.iter().find(|period| period.label == label)
    }

    /// Column of `activity` inside `period`.
    pub fn resolve(&self, period: &str, activity: &str) -> Option<u32> {
        self.period(period)?.column(activity)
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// One line per period: `1er Trimestre: TAREA 1=D, TAREA 2=E`.
    pub fn summary(&self) -> String {
        self.periods
            .iter()
            .map(|period| {
                let activities = period
                    .activities()
                    .map(|(label, col)| format!("{label}={}", column_letters(col)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {activities}", period.label)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
