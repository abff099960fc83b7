//! Test infrastructure for search compilation.
//!
//! Builds SQLite-backed search contexts and seeds them with small,
//! hand-indexed resource graphs.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
