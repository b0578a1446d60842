//! E2E test harness for revgraph.
//!
//! Scenarios build a throwaway git repository step by step, load it through
//! [`revgraph_core::Repository`] and assert on the resulting graph.

#![allow(dead_code)]

pub mod fixture;
pub mod runner;
pub mod scenario;
pub mod steps;

// Re-export commonly used types
pub use assertions::{Assertion, StatusMatch};
pub use fixture::GitFixture;
pub use scenario::Scenario;
