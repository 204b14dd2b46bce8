//! Heuristics module for TA pickup.
//!
//! This module exports all construction and improvement heuristics.

pub mod construction;
pub mod local_search;

pub use construction::*;
pub use local_search::*;
