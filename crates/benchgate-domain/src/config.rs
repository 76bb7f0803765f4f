//! Validated inputs of a comparison run.

use benchgate_error::ConfigError;
use benchgate_types::{
    validate_metric_name, Candidate, DEFAULT_ALPHA, DEFAULT_MAX_ROUNDS, DEFAULT_MIN_ROUNDS,
    MIN_ROUNDS_FLOOR,
};
use std::collections::BTreeSet;

/// Termination policy of the round loop.
///
/// Passed by value into each engine; nothing here is shared between runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    min_rounds: u32,
    max_rounds: u32,
    alpha: f64,
}

impl EngineConfig {
    pub fn new(min_rounds: u32, max_rounds: u32, alpha: f64) -> Result<Self, ConfigError> {
        if min_rounds < MIN_ROUNDS_FLOOR {
            return Err(ConfigError::MinRoundsBelowFloor {
                min_rounds,
                floor: MIN_ROUNDS_FLOOR,
            });
        }
        if max_rounds < min_rounds {
            return Err(ConfigError::MaxRoundsBelowMinRounds {
                max_rounds,
                min_rounds,
            });
        }
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }
        Ok(Self {
            min_rounds,
            max_rounds,
            alpha,
        })
    }

    /// Rounds that must complete before the first significance test.
    pub fn min_rounds(&self) -> u32 {
        self.min_rounds
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_rounds: DEFAULT_MIN_ROUNDS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// Who is compared against whom, on which metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonPlan {
    baseline: Candidate,
    candidates: Vec<Candidate>,
    metrics: Vec<String>,
}

impl ComparisonPlan {
    pub fn new(
        baseline: Candidate,
        candidates: Vec<Candidate>,
        metrics: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }
        let mut seen = BTreeSet::new();
        for m in &metrics {
            validate_metric_name(m)?;
            if !seen.insert(m.as_str()) {
                return Err(ConfigError::DuplicateMetric(m.clone()));
            }
        }

        if candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        let mut seen = BTreeSet::new();
        for c in &candidates {
            if *c == baseline {
                return Err(ConfigError::CandidateIsBaseline(c.to_string()));
            }
            if !seen.insert(c) {
                return Err(ConfigError::DuplicateCandidate(c.to_string()));
            }
        }

        Ok(Self {
            baseline,
            candidates,
            metrics,
        })
    }

    pub fn baseline(&self) -> &Candidate {
        &self.baseline
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }
}
