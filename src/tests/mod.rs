//! Internal test modules - whitebox tests with crate access
//!
//! Scenario tests driving the fully wired engine over the fakes in
//! `test_harness`.
