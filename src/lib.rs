//! Benchgate workspace-level test harness.
//!
//! This crate only hosts the workspace integration tests in `tests/integration/`
//! and the BDD scenarios run by `tests/cucumber.rs` against `features/`.
//!
//! The functionality lives in the member crates:
//! - `benchgate-types`: receipts, config schema, shared value types
//! - `benchgate-significance`: Welch's t-test and the three-way verdict
//! - `benchgate-domain`: the sequential engine, I/O-free
//! - `benchgate-adapters`: process runner, host probe, clock
//! - `benchgate-app`: use cases and renderers
//! - `benchgate-cli`: the `benchgate` binary
