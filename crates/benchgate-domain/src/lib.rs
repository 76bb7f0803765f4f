//! Domain logic for benchgate.
//!
//! This crate is intentionally I/O-free: program execution sits behind
//! [`SampleSource`], randomness behind [`rand::Rng`]. What remains is the
//! round loop, the per-pair status table and the termination policy.

mod collector;
mod config;
mod engine;
mod history;
mod status;

pub use collector::{SampleCollector, SampleSource};
pub use config::{ComparisonPlan, EngineConfig};
pub use engine::{run_comparison, Decision, Outcome, RoundReport, SequentialEngine};
pub use history::SampleHistories;
pub use status::{PairState, StatusTable};

use benchgate_error::{ExecutionError, SignificanceError};

/// Why a started run was aborted. Invalid settings are rejected earlier, by
/// [`EngineConfig::new`] and [`ComparisonPlan::new`].
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Significance(#[from] SignificanceError),
}
