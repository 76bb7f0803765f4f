//! Unified error types for benchgate.
//!
//! The taxonomy is deliberately small:
//! - [`ConfigError`]: the comparison cannot start. Raised before any process is spawned.
//! - [`ExecutionError`]: a measured program produced no usable observation. Fatal for the run.
//! - [`SignificanceError`]: misuse of the significance test (too few samples, non-finite input).
//!
//! Outer layers wrap these in `anyhow` with context.

/// Errors that prevent a comparison run from starting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_rounds ({min_rounds}) cannot be lower than the floor of {floor}")]
    MinRoundsBelowFloor { min_rounds: u32, floor: u32 },

    #[error("max_rounds ({max_rounds}) cannot be lower than min_rounds ({min_rounds})")]
    MaxRoundsBelowMinRounds { max_rounds: u32, min_rounds: u32 },

    #[error("alpha must be in the open interval (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("at least one metric is required")]
    NoMetrics,

    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),

    #[error("invalid metric name {name:?}: {reason}")]
    InvalidMetricName { name: String, reason: &'static str },

    #[error("at least one candidate is required")]
    NoCandidates,

    #[error("duplicate candidate: {0}")]
    DuplicateCandidate(String),

    #[error("candidate {0} is also the baseline")]
    CandidateIsBaseline(String),

    #[error("executable not found: {path} ({reason})")]
    ExecutableNotFound { path: String, reason: String },
}

/// Errors raised while collecting samples. Any of these aborts the whole run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("round {round}: failed to run {candidate}: {reason}")]
    Spawn {
        candidate: String,
        round: u32,
        reason: String,
    },

    #[error("round {round}: {candidate} timed out after {timeout_ms} ms")]
    TimedOut {
        candidate: String,
        round: u32,
        timeout_ms: u64,
    },

    #[error("round {round}: {candidate} printed no line {line} for metric {metric}")]
    MissingLine {
        candidate: String,
        metric: String,
        line: usize,
        round: u32,
    },

    #[error("round {round}: {candidate} printed {value:?} for metric {metric}, expected an integer")]
    NotAnInteger {
        candidate: String,
        metric: String,
        value: String,
        round: u32,
    },
}

impl ExecutionError {
    /// The candidate whose invocation failed.
    pub fn candidate(&self) -> &str {
        match self {
            ExecutionError::Spawn { candidate, .. }
            | ExecutionError::TimedOut { candidate, .. }
            | ExecutionError::MissingLine { candidate, .. }
            | ExecutionError::NotAnInteger { candidate, .. } => candidate,
        }
    }

    /// The round in which the invocation failed.
    pub fn round(&self) -> u32 {
        match self {
            ExecutionError::Spawn { round, .. }
            | ExecutionError::TimedOut { round, .. }
            | ExecutionError::MissingLine { round, .. }
            | ExecutionError::NotAnInteger { round, .. } => *round,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignificanceError {
    #[error("need at least 2 samples per sequence, got {len}")]
    InsufficientSamples { len: usize },

    #[error("sample sequence contains a non-finite value")]
    NonFiniteSample,
}
