//! Destination layout mapping.
//!
//! # Responsibility
//! - Discover `{period -> {activity -> column}}` from a semi-structured sheet.
//!
//! # Invariants
//! - Maps are rebuilt from a fresh snapshot on every load, never persisted.

pub mod activity_map;
pub mod discover;

pub use activity_map::{ActivityMap, Period};
pub use discover::{discover, LayoutError, LayoutOptions};
