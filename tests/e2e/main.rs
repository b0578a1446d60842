//! End-to-end tests against real git repositories.
//!
//! Every scenario is skipped when `git` is not installed.

mod harness;
mod scenarios;
