//! Canvas LMS REST binding.
//!
//! # Responsibility
//! - Implement `RosterSource` over the Canvas v1 API.
//! - Follow `Link` header pagination until the last page.
//!
//! # Invariants
//! - Every request carries the bearer token and `per_page=100`.
//! - Any transport failure or non-success status is `Connectivity`.

use super::{RosterError, RosterResult, RosterSource};
use crate::model::roster::{Assignment, Course, RemoteId, ScoreEntry, Student};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::LINK;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const PAGE_SIZE: &str = "100";

/// Connection settings for one Canvas instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasConfig {
    /// Instance root, e.g. `https://school.instructure.com`.
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CanvasCourse {
    id: RemoteId,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CanvasAssignment {
    id: RemoteId,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CanvasUser {
    id: RemoteId,
    #[serde(default)]
    sortable_name: Option<String>,
}

/// Extracts the `rel="next"` target of a `Link` header.
pub(crate) fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| url.to_string())
    })
}

/// Blocking Canvas client.
pub struct CanvasClient {
    client: Client,
    config: CanvasConfig,
}

impl CanvasClient {
    pub fn new(config: CanvasConfig) -> RosterResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| RosterError::Connectivity(format!("http client: {err}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> RosterResult<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|err| {
            RosterError::Connectivity(format!("base url `{}`: {err}", self.config.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                RosterError::Connectivity(format!(
                    "base url `{}` cannot carry a path",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("per_page", PAGE_SIZE);
        }
        Ok(url)
    }

    /// Collects every page starting at `url`.
    fn get_all<T: DeserializeOwned>(&self, url: Url) -> RosterResult<Vec<T>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(url.to_string());
        while let Some(current) = next.take() {
            if !seen.insert(current.clone()) {
                break;
            }
            let response = self
                .client
                .get(&current)
                .bearer_auth(&self.config.api_token)
                .send()
                .map_err(|err| RosterError::Connectivity(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(RosterError::Connectivity(format!(
                    "status {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }
            next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);
            let page: Vec<T> = response
                .json()
                .map_err(|err| RosterError::Decode(err.to_string()))?;
            debug!(
                "event=roster_page module=roster status=ok items={} more={}",
                page.len(),
                next.is_some()
            );
            items.extend(page);
        }
        Ok(items)
    }
}

impl RosterSource for CanvasClient {
    fn list_active_courses(&self) -> RosterResult<Vec<Course>> {
        let url = self.endpoint(&["courses"], &[("enrollment_state", "active")])?;
        let courses: Vec<Course> = self
            .get_all::<CanvasCourse>(url)?
            .into_iter()
            .filter_map(|course| {
                Some(Course {
                    id: course.id,
                    name: course.name?,
                })
            })
            .collect();
        info!(
            "event=roster_courses module=roster status=ok count={}",
            courses.len()
        );
        Ok(courses)
    }

    fn list_assignments(&self, course: RemoteId) -> RosterResult<Vec<Assignment>> {
        let course_id = course.to_string();
        let url = self.endpoint(&["courses", &course_id, "assignments"], &[])?;
        let assignments: Vec<Assignment> = self
            .get_all::<CanvasAssignment>(url)?
            .into_iter()
            .map(|assignment| Assignment {
                id: assignment.id,
                name: assignment.name.unwrap_or_default(),
            })
            .collect();
        info!(
            "event=roster_assignments module=roster status=ok course={} count={}",
            course,
            assignments.len()
        );
        Ok(assignments)
    }

    fn list_students(&self, course: RemoteId) -> RosterResult<Vec<Student>> {
        let course_id = course.to_string();
        let url = self.endpoint(
            &["courses", &course_id, "users"],
            &[
                ("enrollment_type[]", "student"),
                ("sort", "sortable_name"),
                ("order", "asc"),
            ],
        )?;
        let students: Vec<Student> = self
            .get_all::<CanvasUser>(url)?
            .into_iter()
            .filter_map(|user| {
                Some(Student {
                    id: user.id,
                    name: user.sortable_name?,
                })
            })
            .collect();
        info!(
            "event=roster_students module=roster status=ok course={} count={}",
            course,
            students.len()
        );
        Ok(students)
    }

    fn list_scores(&self, course: RemoteId, assignment: RemoteId) -> RosterResult<Vec<ScoreEntry>> {
        let course_id = course.to_string();
        let assignment_id = assignment.to_string();
        let url = self.endpoint(
            &["courses", &course_id, "assignments", &assignment_id, "submissions"],
            &[],
        )?;
        let scores: Vec<ScoreEntry> = self.get_all(url)?;
        info!(
            "event=roster_scores module=roster status=ok course={} assignment={} count={}",
            course,
            assignment,
            scores.len()
        );
        Ok(scores)
    }
}
