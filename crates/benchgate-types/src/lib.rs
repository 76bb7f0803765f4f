//! Shared types for benchgate.
//!
//! Design goal: versioned, explicit, boring.
//! These structs are used for compare receipts, PR comments, and the config file.

use benchgate_error::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const COMPARE_SCHEMA_V1: &str = "benchgate.compare.v1";

/// No comparison may run fewer significance-free rounds than this.
pub const MIN_ROUNDS_FLOOR: u32 = 5;
pub const DEFAULT_MIN_ROUNDS: u32 = MIN_ROUNDS_FLOOR;
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_ALPHA: f64 = 0.02;

const MAX_METRIC_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub host: HostInfo,
}

/// An opaque program identifier, usually an executable path.
#[derive(
    Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Candidate(String);

impl Candidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Candidate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Candidate {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Larger observations are better (throughput, nodes per second).
    #[default]
    Higher,
    /// Smaller observations are better (latency, memory).
    Lower,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Higher => "higher",
            Direction::Lower => "lower",
        }
    }

    /// Map a natural observation onto the higher-is-better scale, and back.
    /// The mapping is its own inverse.
    pub fn orient(self, value: f64) -> f64 {
        match self {
            Direction::Higher => value,
            Direction::Lower => -value,
        }
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "higher" => Ok(Direction::Higher),
            "lower" => Ok(Direction::Lower),
            other => Err(ParseError::UnknownDirection(other.to_string())),
        }
    }
}

/// A tracked metric: one output line of every measured program, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: String,

    #[serde(default)]
    pub direction: Direction,
}

impl MetricSpec {
    pub fn higher(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Higher,
        }
    }

    pub fn lower(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Lower,
        }
    }
}

/// Parses `name` or `name:higher` / `name:lower`.
impl FromStr for MetricSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, direction) = match s.split_once(':') {
            Some((name, dir)) => (name, dir.parse()?),
            None => (s, Direction::default()),
        };
        validate_metric_name(name).map_err(ParseError::Config)?;
        Ok(MetricSpec {
            name: name.to_string(),
            direction,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown direction {0:?} (expected higher|lower)")]
    UnknownDirection(String),

    #[error(transparent)]
    Config(ConfigError),
}

/// Metric names end up in receipts, markdown tables and annotations.
pub fn validate_metric_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidMetricName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_METRIC_NAME_LEN {
        return Err(invalid("must be at most 64 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(invalid("only ASCII letters, digits, '_', '-' and '.' are allowed"));
    }
    Ok(())
}

/// Classification of one (candidate, metric) pair.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn is_decided(self) -> bool {
        !matches!(self, Status::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Accepted => "accepted",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SampleSummary {
    pub n: u32,
    pub mean: f64,

    /// Bessel-corrected; absent below two samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TestSummary {
    /// Positive favours the candidate. Absent when unbounded, which happens
    /// when both samples are constant with different means.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_statistic: Option<f64>,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MetricHistory {
    pub summary: SampleSummary,

    /// Observations in round order, natural sign.
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PairReport {
    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at_round: Option<u32>,

    pub history: MetricHistory,

    /// The most recent significance test against the baseline, if any ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_test: Option<TestSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BaselineReport {
    pub name: String,
    pub metrics: BTreeMap<String, MetricHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CandidateReport {
    pub name: String,
    pub metrics: BTreeMap<String, PairReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EngineSettings {
    pub min_rounds: u32,
    pub max_rounds: u32,
    pub alpha: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Inconclusive,
    Fail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GateCounts {
    pub accepted: u32,
    pub pending: u32,
    pub rejected: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GateVerdict {
    pub status: GateStatus,
    pub counts: GateCounts,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CompareReceipt {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunMeta,

    /// Gate name when the run came from a config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,

    pub settings: EngineSettings,
    pub metrics: Vec<MetricSpec>,
    pub rounds: u32,
    pub baseline: BaselineReport,

    /// Keyed by candidate identifier.
    pub candidates: BTreeMap<String, CandidateReport>,

    pub verdict: GateVerdict,
}

impl CompareReceipt {
    /// The final classification of every (candidate, metric) pair.
    pub fn statuses(&self) -> BTreeMap<&str, BTreeMap<&str, Status>> {
        self.candidates
            .iter()
            .map(|(name, report)| {
                let per_metric = report
                    .metrics
                    .iter()
                    .map(|(metric, pair)| (metric.as_str(), pair.status))
                    .collect();
                (name.as_str(), per_metric)
            })
            .collect()
    }
}

// ----------------------------
// Config file schema
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default, rename = "gate")]
    pub gates: Vec<GateConfigFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rounds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,

    /// Duration string parseable by humantime, e.g. "60s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GateConfigFile {
    pub name: String,

    /// The reference executable.
    pub baseline: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,

    /// Glob pattern adding candidates (the baseline is excluded from matches).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_glob: Option<String>,

    #[serde(rename = "metric")]
    pub metrics: Vec<MetricSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rounds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn valid_names_parse_as_higher_metrics(name in "[a-zA-Z0-9_.-]{1,64}") {
            let spec: MetricSpec = name.parse().unwrap();
            prop_assert_eq!(spec.name, name);
            prop_assert_eq!(spec.direction, Direction::Higher);
        }

        #[test]
        fn names_with_whitespace_are_rejected(
            prefix in "[a-z]{0,5}",
            suffix in "[a-z]{0,5}",
        ) {
            let name = format!("{prefix} {suffix}");
            prop_assert!(validate_metric_name(&name).is_err());
        }
    }
}
