//! Name reconciliation between independently sourced rosters.
//!
//! # Responsibility
//! - Canonicalize personal names (`normalize`).
//! - Pair a roster name with a destination row (`matcher`).

pub mod matcher;
pub mod normalize;
