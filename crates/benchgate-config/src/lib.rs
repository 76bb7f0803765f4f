//! Configuration loading and merging for benchgate.
//!
//! Settings resolve in three layers, each overriding the one before:
//! built-in defaults, then `[defaults]` and the `[[gate]]` table from
//! `benchgate.toml`, then command-line flags.

use anyhow::Context;
use benchgate_error::ConfigError;
use benchgate_types::{
    ConfigFile, DEFAULT_ALPHA, DEFAULT_MAX_ROUNDS, DEFAULT_MIN_ROUNDS, GateConfigFile, MetricSpec,
};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "benchgate.toml";

/// Read a config file. `.json` files are parsed as JSON, everything else as TOML.
pub fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let config = if is_json {
        serde_json::from_str(&text).with_context(|| format!("parse json {}", path.display()))?
    } else {
        parse_config(&text).with_context(|| format!("parse toml {}", path.display()))?
    };
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(text)
}

pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let d = humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))?;
    Ok(d)
}

/// Values supplied on the command line. `None` defers to the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub min_rounds: Option<u32>,
    pub max_rounds: Option<u32>,
    pub alpha: Option<f64>,
    pub timeout: Option<Duration>,
    pub seed: Option<u64>,
    pub out_dir: Option<PathBuf>,
}

/// A gate with every layer applied and its candidate list expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGate {
    pub name: String,
    pub baseline: String,
    pub candidates: Vec<String>,
    pub metrics: Vec<MetricSpec>,
    pub min_rounds: u32,
    pub max_rounds: u32,
    pub alpha: f64,
    pub timeout: Option<Duration>,
    pub seed: Option<u64>,
    pub out_dir: PathBuf,
}

pub fn gate_names(config: &ConfigFile) -> Vec<&str> {
    config.gates.iter().map(|g| g.name.as_str()).collect()
}

pub fn resolve_gate(
    config: &ConfigFile,
    name: &str,
    overrides: &Overrides,
) -> anyhow::Result<ResolvedGate> {
    let gate = find_gate(config, name)?;
    let defaults = &config.defaults;

    let min_rounds = overrides
        .min_rounds
        .or(gate.min_rounds)
        .or(defaults.min_rounds)
        .unwrap_or(DEFAULT_MIN_ROUNDS);
    let max_rounds = overrides
        .max_rounds
        .or(gate.max_rounds)
        .or(defaults.max_rounds)
        .unwrap_or(DEFAULT_MAX_ROUNDS);
    let alpha = overrides
        .alpha
        .or(gate.alpha)
        .or(defaults.alpha)
        .unwrap_or(DEFAULT_ALPHA);

    let timeout = match overrides.timeout {
        Some(t) => Some(t),
        None => gate
            .timeout
            .as_deref()
            .or(defaults.timeout.as_deref())
            .map(|s| {
                parse_duration(s).with_context(|| format!("invalid timeout for gate '{name}'"))
            })
            .transpose()?,
    };

    let out_dir = overrides
        .out_dir
        .clone()
        .or_else(|| defaults.out_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("artifacts/benchgate"));

    let candidates = expand_candidates(
        &gate.candidates,
        gate.candidates_glob.as_deref(),
        &gate.baseline,
    )?;
    if gate.metrics.is_empty() {
        return Err(ConfigError::NoMetrics.into());
    }

    debug!(gate = name, min_rounds, max_rounds, alpha, candidates = candidates.len(), "resolved gate");

    Ok(ResolvedGate {
        name: gate.name.clone(),
        baseline: gate.baseline.clone(),
        candidates,
        metrics: gate.metrics.clone(),
        min_rounds,
        max_rounds,
        alpha,
        timeout,
        seed: overrides.seed,
        out_dir,
    })
}

fn find_gate<'a>(config: &'a ConfigFile, name: &str) -> anyhow::Result<&'a GateConfigFile> {
    config
        .gates
        .iter()
        .find(|g| g.name == name)
        .with_context(|| {
            format!(
                "gate '{name}' not found in config (available: {})",
                gate_names(config).join(", ")
            )
        })
}

/// Explicit candidates first, then glob matches in path order.
///
/// Matches equal to the baseline or to an explicit entry are skipped.
pub fn expand_candidates(
    explicit: &[String],
    pattern: Option<&str>,
    baseline: &str,
) -> anyhow::Result<Vec<String>> {
    let mut out: Vec<String> = explicit.to_vec();
    let Some(pattern) = pattern else {
        return Ok(out);
    };

    let entries = glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
    for entry in entries {
        let path = entry.with_context(|| format!("read glob match for {pattern}"))?;
        if !path.is_file() || same_path(&path, Path::new(baseline)) {
            continue;
        }
        // A bare file name would be looked up on PATH when spawned.
        let candidate = if path.components().count() == 1 {
            format!(".{}{}", std::path::MAIN_SEPARATOR, path.display())
        } else {
            path.display().to_string()
        };
        if out.iter().any(|c| same_path(Path::new(c), &path)) {
            continue;
        }
        out.push(candidate);
    }
    Ok(out)
}

fn same_path(a: &Path, b: &Path) -> bool {
    if let (Ok(ca), Ok(cb)) = (fs::canonicalize(a), fs::canonicalize(b)) {
        return ca == cb;
    }
    normalized(a) == normalized(b)
}

fn normalized(p: &Path) -> Vec<Component<'_>> {
    p.components().filter(|c| *c != Component::CurDir).collect()
}
