//! Application layer for benchgate.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags and it does not do filesystem I/O.

mod check;

pub use check::{CheckOutcome, CheckRequest, CheckUseCase};

use anyhow::Context;
use benchgate_adapters::{
    resolve_executable, Clock, CommandSpec, HostProbe, ProcessRunner,
};
use benchgate_domain::{run_comparison, ComparisonPlan, EngineConfig, Outcome, SampleSource};
use benchgate_error::ExecutionError;
use benchgate_types::{
    BaselineReport, Candidate, CandidateReport, CompareReceipt, Direction, EngineSettings,
    GateCounts, GateStatus, GateVerdict, MetricHistory, MetricSpec, PairReport, RunMeta,
    SampleSummary, Status, ToolInfo, COMPARE_SCHEMA_V1,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Runs candidates as child processes and reads one integer per metric from stdout.
///
/// Line `i` of stdout is the observation for metric `i`. Values of
/// lower-is-better metrics are negated on the way in so the engine only ever
/// sees higher-is-better numbers.
pub struct ProcessSampleSource<R> {
    runner: R,
    directions: Vec<Direction>,
    timeout: Option<Duration>,
}

impl<R: ProcessRunner> ProcessSampleSource<R> {
    pub fn new(runner: R, metrics: &[MetricSpec], timeout: Option<Duration>) -> Self {
        Self {
            runner,
            directions: metrics.iter().map(|m| m.direction).collect(),
            timeout,
        }
    }
}

impl<R: ProcessRunner> SampleSource for ProcessSampleSource<R> {
    fn sample(
        &mut self,
        candidate: &Candidate,
        metrics: &[String],
        round: u32,
    ) -> Result<Vec<f64>, ExecutionError> {
        let spec = CommandSpec {
            timeout: self.timeout,
            ..CommandSpec::bare(candidate.as_str())
        };

        let run = self.runner.run(&spec).map_err(|e| ExecutionError::Spawn {
            candidate: candidate.to_string(),
            round,
            reason: e.to_string(),
        })?;

        if run.timed_out {
            return Err(ExecutionError::TimedOut {
                candidate: candidate.to_string(),
                round,
                timeout_ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
            });
        }
        if run.exit_code != Some(0) {
            debug!(candidate = %candidate, exit_code = ?run.exit_code, "nonzero exit ignored");
        }

        let stdout = String::from_utf8_lossy(&run.stdout);
        let values = parse_metric_lines(&stdout, metrics, candidate.as_str(), round)?;

        Ok(values
            .into_iter()
            .zip(&self.directions)
            .map(|(v, d)| d.orient(v as f64))
            .collect())
    }
}

/// Parse the first `metrics.len()` lines of `stdout` as signed integers.
///
/// Lines are trimmed before parsing; lines past the last metric are ignored.
pub fn parse_metric_lines(
    stdout: &str,
    metrics: &[String],
    candidate: &str,
    round: u32,
) -> Result<Vec<i64>, ExecutionError> {
    let mut lines = stdout.lines();
    metrics
        .iter()
        .enumerate()
        .map(|(i, metric)| {
            let raw = lines.next().ok_or_else(|| ExecutionError::MissingLine {
                candidate: candidate.to_string(),
                metric: metric.clone(),
                line: i + 1,
                round,
            })?;
            let trimmed = raw.trim();
            trimmed
                .parse::<i64>()
                .map_err(|_| ExecutionError::NotAnInteger {
                    candidate: candidate.to_string(),
                    metric: metric.clone(),
                    value: trimmed.to_string(),
                    round,
                })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub baseline: String,
    pub candidates: Vec<String>,
    pub metrics: Vec<MetricSpec>,
    pub min_rounds: u32,
    pub max_rounds: u32,
    pub alpha: f64,

    /// Per-invocation watchdog. `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// Seeds the visitation shuffle; `None` draws from OS entropy.
    pub seed: Option<u64>,

    /// Gate name, when the request came from a config file.
    pub gate: Option<String>,

    pub tool: ToolInfo,
}

pub struct CompareUseCase<R: ProcessRunner, H: HostProbe, C: Clock> {
    runner: R,
    host_probe: H,
    clock: C,
    check_executables: bool,
}

impl<R: ProcessRunner, H: HostProbe, C: Clock> CompareUseCase<R, H, C> {
    pub fn new(runner: R, host_probe: H, clock: C) -> Self {
        Self {
            runner,
            host_probe,
            clock,
            check_executables: true,
        }
    }

    /// Do not resolve candidate paths before running. For runners that never
    /// touch the filesystem.
    pub fn skip_executable_check(mut self) -> Self {
        self.check_executables = false;
        self
    }

    /// Run the comparison to completion and wrap it in a receipt.
    ///
    /// Configuration problems are reported before anything is spawned. An
    /// execution error aborts the run and no receipt is produced.
    pub fn execute(&self, req: CompareRequest) -> anyhow::Result<CompareReceipt> {
        let config = EngineConfig::new(req.min_rounds, req.max_rounds, req.alpha)?;
        let plan = ComparisonPlan::new(
            Candidate::new(req.baseline.clone()),
            req.candidates.iter().cloned().map(Candidate::new).collect(),
            req.metrics.iter().map(|m| m.name.clone()).collect(),
        )?;

        if self.check_executables {
            for program in std::iter::once(&req.baseline).chain(&req.candidates) {
                let path = resolve_executable(program)?;
                debug!(program = %program, resolved = %path.display(), "resolved executable");
            }
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now_rfc3339();
        let host = self.host_probe.probe();

        info!(
            baseline = %req.baseline,
            candidates = req.candidates.len(),
            metrics = req.metrics.len(),
            min_rounds = config.min_rounds(),
            max_rounds = config.max_rounds(),
            alpha = config.alpha(),
            "starting comparison"
        );

        let rng = match req.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let source = ProcessSampleSource::new(&self.runner, &req.metrics, req.timeout);
        let outcome = run_comparison(config, plan, source, rng)
            .context("comparison aborted")?;

        let ended_at = self.clock.now_rfc3339();

        let receipt = build_receipt(
            &req,
            &outcome,
            RunMeta {
                id: run_id,
                started_at,
                ended_at,
                host,
            },
        );
        info!(
            rounds = receipt.rounds,
            status = ?receipt.verdict.status,
            accepted = receipt.verdict.counts.accepted,
            rejected = receipt.verdict.counts.rejected,
            pending = receipt.verdict.counts.pending,
            "comparison finished"
        );
        Ok(receipt)
    }
}

fn build_receipt(req: &CompareRequest, outcome: &Outcome, run: RunMeta) -> CompareReceipt {
    let natural_history = |candidate: &Candidate, idx: usize| -> MetricHistory {
        let direction = req.metrics[idx].direction;
        let samples: Vec<f64> = outcome
            .histories
            .samples(candidate, idx)
            .iter()
            .map(|v| direction.orient(*v))
            .collect();
        let summary = benchgate_stats::summarize(&samples).unwrap_or(SampleSummary {
            n: 0,
            mean: 0.0,
            std_dev: None,
        });
        MetricHistory { summary, samples }
    };

    let baseline = BaselineReport {
        name: outcome.baseline.to_string(),
        metrics: outcome
            .metrics
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), natural_history(&outcome.baseline, idx)))
            .collect(),
    };

    let candidates: BTreeMap<String, CandidateReport> = outcome
        .candidates
        .iter()
        .map(|candidate| {
            let states = outcome.pairs.get(candidate);
            let metrics = outcome
                .metrics
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let state = states.and_then(|s| s.get(idx)).copied().unwrap_or_default();
                    let report = PairReport {
                        status: state.status,
                        decided_at_round: state.decided_at_round,
                        history: natural_history(candidate, idx),
                        last_test: state.last_test.map(Into::into),
                    };
                    (name.clone(), report)
                })
                .collect();
            (
                candidate.to_string(),
                CandidateReport {
                    name: candidate.to_string(),
                    metrics,
                },
            )
        })
        .collect();

    let verdict = gate_verdict(&candidates, outcome.rounds);

    CompareReceipt {
        schema: COMPARE_SCHEMA_V1.to_string(),
        tool: req.tool.clone(),
        run,
        gate: req.gate.clone(),
        settings: EngineSettings {
            min_rounds: req.min_rounds,
            max_rounds: req.max_rounds,
            alpha: req.alpha,
            timeout_ms: req.timeout.map(|d| d.as_millis() as u64),
            seed: req.seed,
        },
        metrics: req.metrics.clone(),
        rounds: outcome.rounds,
        baseline,
        candidates,
        verdict,
    }
}

/// Fail on any rejection, otherwise inconclusive on any pending pair, otherwise pass.
pub fn gate_verdict(candidates: &BTreeMap<String, CandidateReport>, rounds: u32) -> GateVerdict {
    let mut counts = GateCounts::default();
    let mut reasons = Vec::new();

    for (name, report) in candidates {
        for (metric, pair) in &report.metrics {
            match pair.status {
                Status::Accepted => counts.accepted += 1,
                Status::Rejected => {
                    counts.rejected += 1;
                    reasons.push(match pair.decided_at_round {
                        Some(r) => format!("{name} {metric}: rejected at round {r}"),
                        None => format!("{name} {metric}: rejected"),
                    });
                }
                Status::Pending => {
                    counts.pending += 1;
                    reasons.push(format!(
                        "{name} {metric}: no significant difference after {rounds} rounds"
                    ));
                }
            }
        }
    }

    let status = if counts.rejected > 0 {
        GateStatus::Fail
    } else if counts.pending > 0 {
        GateStatus::Inconclusive
    } else {
        GateStatus::Pass
    };

    GateVerdict {
        status,
        counts,
        reasons,
    }
}

/// 0 pass, 2 any rejection, 3 inconclusive when pending pairs should fail the build.
pub fn exit_code_for(verdict: &GateVerdict, fail_on_pending: bool) -> i32 {
    match verdict.status {
        GateStatus::Pass => 0,
        GateStatus::Fail => 2,
        GateStatus::Inconclusive if fail_on_pending => 3,
        GateStatus::Inconclusive => 0,
    }
}

// ----------------------------
// Rendering helpers
// ----------------------------

pub fn render_markdown(compare: &CompareReceipt) -> String {
    let mut out = String::new();

    let header = match compare.verdict.status {
        GateStatus::Pass => "✅ benchgate: pass",
        GateStatus::Inconclusive => "⚠️ benchgate: inconclusive",
        GateStatus::Fail => "❌ benchgate: fail",
    };

    out.push_str(header);
    out.push_str("\n\n");

    if let Some(gate) = &compare.gate {
        out.push_str(&format!("**Gate:** `{gate}`\n\n"));
    }
    out.push_str(&format!(
        "**Baseline:** `{}` · **Rounds:** {} (min {}, max {}, alpha {})\n\n",
        compare.baseline.name,
        compare.rounds,
        compare.settings.min_rounds,
        compare.settings.max_rounds,
        compare.settings.alpha,
    ));

    out.push_str("| candidate | metric | baseline (mean) | candidate (mean) | delta | p | status |\n");
    out.push_str("|---|---|---:|---:|---:|---:|---|\n");

    for (name, report) in &compare.candidates {
        for spec in &compare.metrics {
            let Some(pair) = report.metrics.get(&spec.name) else {
                continue;
            };
            let base = compare
                .baseline
                .metrics
                .get(&spec.name)
                .map(|h| h.summary.mean);

            out.push_str(&format!(
                "| `{name}` | `{metric}` ({dir}) | {b} | {c} | {pct} | {p} | {status} |\n",
                metric = spec.name,
                dir = spec.direction.as_str(),
                b = base.map(format_value).unwrap_or_default(),
                c = format_value(pair.history.summary.mean),
                pct = base
                    .map(|b| format_pct(b, pair.history.summary.mean))
                    .unwrap_or_default(),
                p = pair
                    .last_test
                    .map(|t| format_p(t.p_value))
                    .unwrap_or_else(|| "–".to_string()),
                status = status_icon(pair.status),
            ));
        }
    }

    if !compare.verdict.reasons.is_empty() {
        out.push_str("\n**Notes:**\n");
        for r in &compare.verdict.reasons {
            out.push_str(&format!("- {}\n", r));
        }
    }

    out
}

pub fn github_annotations(compare: &CompareReceipt) -> Vec<String> {
    let mut lines = Vec::new();

    for (name, report) in &compare.candidates {
        for spec in &compare.metrics {
            let Some(pair) = report.metrics.get(&spec.name) else {
                continue;
            };
            let (prefix, what) = match (pair.status, pair.decided_at_round) {
                (Status::Rejected, Some(r)) => ("::error", format!("rejected at round {r}")),
                (Status::Rejected, None) => ("::error", "rejected".to_string()),
                (Status::Pending, _) => (
                    "::warning",
                    format!("inconclusive after {} rounds", compare.rounds),
                ),
                (Status::Accepted, _) => continue,
            };
            let base = compare
                .baseline
                .metrics
                .get(&spec.name)
                .map(|h| format_value(h.summary.mean))
                .unwrap_or_default();

            let msg = format!(
                "benchgate {name} {metric}: {what} (baseline mean {base}, candidate mean {c}{p})",
                metric = spec.name,
                c = format_value(pair.history.summary.mean),
                p = pair
                    .last_test
                    .map(|t| format!(", p={}", format_p(t.p_value)))
                    .unwrap_or_default(),
            );
            lines.push(format!("{prefix}::{msg}"));
        }
    }

    lines
}

fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Accepted => "✅ accepted",
        Status::Rejected => "❌ rejected",
        Status::Pending => "⏳ pending",
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn format_pct(baseline: f64, current: f64) -> String {
    if baseline == 0.0 {
        return "n/a".to_string();
    }
    let pct = (current - baseline) / baseline.abs();
    let sign = if pct > 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, pct * 100.0)
}

fn format_p(p: f64) -> String {
    if p < 1e-4 {
        "<0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}
