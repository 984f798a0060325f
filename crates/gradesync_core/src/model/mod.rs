//! Shared value types for grade synchronization.
//!
//! # Responsibility
//! - Define cell coordinates/values used by every destination binding.
//! - Define roster records produced by the fetch phase.
//!
//! # Invariants
//! - Types here carry no I/O; they are plain values.

pub mod cell;
pub mod roster;
