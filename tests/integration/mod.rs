//! Workspace-level integration tests.
//!
//! These drive the sequential engine end to end through the scripted test
//! double, so no processes are spawned.

mod engine_scenarios;
mod receipts;
