//! Token-overlap name matcher.
//!
//! # Responsibility
//! - Pick the destination row whose name best matches a roster name.
//!
//! # Invariants
//! - Overlap is the size of the intersection of distinct canonical tokens.
//! - Ties keep the first candidate seen (lowest row in scan order).
//! - Blank or non-text candidates are skipped, never fatal.
//! - Short names (both sides at most `short_name_max_tokens`) are accepted on a
//!   smaller overlap; this trades precision for recall and can pair two
//!   different people who share one name token.

use crate::model::cell::CellValue;
use crate::names::normalize::CanonicalName;
use serde::{Deserialize, Serialize};

/// Acceptance thresholds for a best candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Overlap that always counts as a match.
    pub min_overlap: usize,
    /// Token count at or below which a name is considered short.
    pub short_name_max_tokens: usize,
    /// Overlap required when both names are short.
    pub short_name_min_overlap: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_overlap: 2,
            short_name_max_tokens: 2,
            short_name_min_overlap: 1,
        }
    }
}

impl MatchPolicy {
    /// Decides whether a best candidate is accepted.
    pub fn accepts(&self, overlap: usize, target_tokens: usize, candidate_tokens: usize) -> bool {
        if overlap >= self.min_overlap {
            return true;
        }
        target_tokens <= self.short_name_max_tokens
            && candidate_tokens <= self.short_name_max_tokens
            && overlap >= self.short_name_min_overlap
    }
}

/// Outcome of one lookup.
///
/// `row` is `None` when the policy rejected the best candidate or no candidate
/// carried text; `score` still reports the best overlap seen (0 when none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub row: Option<u32>,
    pub matched_name: Option<String>,
    pub score: usize,
}

impl MatchResult {
    fn no_match(score: usize) -> Self {
        Self {
            row: None,
            matched_name: None,
            score,
        }
    }

    pub fn is_match(&self) -> bool {
        self.row.is_some()
    }
}

/// Finds the best-matching row for `target` among `(row, name)` candidates.
pub fn find_best_match<'a, I>(target: &str, candidates: I, policy: &MatchPolicy) -> MatchResult
where
    I: IntoIterator<Item = (u32, Option<&'a str>)>,
{
    let target_name = CanonicalName::new(target);
    if target_name.is_empty() {
        return MatchResult::no_match(0);
    }
    let target_tokens = target_name.token_set();

    // (row, raw name, overlap, distinct candidate tokens)
    let mut best: Option<(u32, &str, usize, usize)> = None;
    for (row, raw) in candidates {
        let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
            continue;
        };
        let candidate = CanonicalName::new(raw);
        let candidate_tokens = candidate.token_set();
        let overlap = target_tokens.intersection(&candidate_tokens).count();
        let improves = best.map_or(true, |(_, _, best_overlap, _)| overlap > best_overlap);
        if improves {
            best = Some((row, raw, overlap, candidate_tokens.len()));
        }
    }

    let Some((row, raw, overlap, candidate_len)) = best else {
        return MatchResult::no_match(0);
    };
    if policy.accepts(overlap, target_tokens.len(), candidate_len) {
        MatchResult {
            row: Some(row),
            matched_name: Some(raw.to_string()),
            score: overlap,
        }
    } else {
        MatchResult::no_match(overlap)
    }
}

/// Convenience wrapper returning only the matched row.
pub fn find_best_row<'a, I>(target: &str, candidates: I, policy: &MatchPolicy) -> Option<u32>
where
    I: IntoIterator<Item = (u32, Option<&'a str>)>,
{
    find_best_match(target, candidates, policy).row
}

/// Adapts `(row, cell)` pairs into matcher candidates.
pub fn cell_candidates<'a, I>(cells: I) -> impl Iterator<Item = (u32, Option<&'a str>)>
where
    I: IntoIterator<Item = (u32, &'a CellValue)>,
{
    cells
        .into_iter()
        .map(|(row, value)| (row, value.as_text()))
}
