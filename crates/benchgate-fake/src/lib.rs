//! Deterministic test doubles for benchgate.
//!
//! - [`ScriptedSampleSource`] stands in for real executables at the
//!   [`SampleSource`] seam the engine drives.
//! - [`FakeProcessRunner`] replays canned stdout at the [`ProcessRunner`] seam,
//!   so the process-backed source can be exercised without spawning anything.
//! - [`FakeHostProbe`] and [`FixedClock`] pin the receipt metadata.

use benchgate_adapters::{AdapterError, Clock, CommandSpec, HostProbe, ProcessRunner, RunResult};
use benchgate_domain::SampleSource;
use benchgate_error::ExecutionError;
use benchgate_types::{Candidate, HostInfo};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// What one candidate prints, invocation after invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// The same values every time.
    Constant(Vec<f64>),
    /// One entry per invocation; the last entry repeats once the list runs out.
    Sequence(Vec<Vec<f64>>),
}

impl Script {
    fn values_at(&self, invocation: usize) -> Vec<f64> {
        match self {
            Script::Constant(v) => v.clone(),
            Script::Sequence(seq) => seq
                .get(invocation)
                .or_else(|| seq.last())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// One recorded call to [`ScriptedSampleSource::sample`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCall {
    pub candidate: Candidate,
    pub round: u32,
}

/// A [`SampleSource`] that returns scripted values per candidate.
///
/// # Example
///
/// ```
/// use benchgate_domain::SampleSource;
/// use benchgate_fake::ScriptedSampleSource;
///
/// let mut source = ScriptedSampleSource::new()
///     .constant("base", [1000.0])
///     .constant("fast", [2000.0]);
///
/// let got = source.sample(&"fast".into(), &["perft".to_string()], 1).unwrap();
/// assert_eq!(got, vec![2000.0]);
/// assert_eq!(source.invocations_of("fast"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSampleSource {
    scripts: BTreeMap<Candidate, Script>,
    failures: BTreeMap<Candidate, (u32, String)>,
    invocations: BTreeMap<Candidate, usize>,
    calls: Vec<SampleCall>,
}

impl ScriptedSampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(
        mut self,
        candidate: impl Into<Candidate>,
        values: impl IntoIterator<Item = f64>,
    ) -> Self {
        self.scripts.insert(
            candidate.into(),
            Script::Constant(values.into_iter().collect()),
        );
        self
    }

    pub fn sequence(mut self, candidate: impl Into<Candidate>, runs: Vec<Vec<f64>>) -> Self {
        self.scripts.insert(candidate.into(), Script::Sequence(runs));
        self
    }

    /// Make `candidate` print `output` (not an integer) on its `invocation`-th run, 1-based.
    pub fn fail_at(
        mut self,
        candidate: impl Into<Candidate>,
        invocation: u32,
        output: impl Into<String>,
    ) -> Self {
        self.failures
            .insert(candidate.into(), (invocation, output.into()));
        self
    }

    pub fn invocations_of(&self, candidate: impl Into<Candidate>) -> usize {
        self.invocations
            .get(&candidate.into())
            .copied()
            .unwrap_or(0)
    }

    pub fn calls(&self) -> &[SampleCall] {
        &self.calls
    }

    /// Round numbers in which `candidate` ran, in call order.
    pub fn rounds_of(&self, candidate: impl Into<Candidate>) -> Vec<u32> {
        let candidate = candidate.into();
        self.calls
            .iter()
            .filter(|c| c.candidate == candidate)
            .map(|c| c.round)
            .collect()
    }
}

impl SampleSource for ScriptedSampleSource {
    fn sample(
        &mut self,
        candidate: &Candidate,
        metrics: &[String],
        round: u32,
    ) -> Result<Vec<f64>, ExecutionError> {
        let count = self.invocations.entry(candidate.clone()).or_insert(0);
        let invocation = *count;
        *count += 1;
        self.calls.push(SampleCall {
            candidate: candidate.clone(),
            round,
        });

        if let Some((at, output)) = self.failures.get(candidate) {
            if usize::try_from(*at).ok() == Some(invocation + 1) {
                return Err(ExecutionError::NotAnInteger {
                    candidate: candidate.to_string(),
                    metric: metrics.first().cloned().unwrap_or_default(),
                    value: output.clone(),
                    round,
                });
            }
        }

        let script = self
            .scripts
            .get(candidate)
            .ok_or_else(|| ExecutionError::Spawn {
                candidate: candidate.to_string(),
                round,
                reason: "no script registered for candidate".to_string(),
            })?;
        Ok(script.values_at(invocation))
    }
}

/// A [`ProcessRunner`] that replays canned stdout keyed by `argv[0]`.
///
/// Queued outputs are consumed first; once a program's queue is empty its
/// fixed output (if any) is returned on every call.
#[derive(Debug, Default)]
pub struct FakeProcessRunner {
    queued: Mutex<BTreeMap<String, VecDeque<String>>>,
    fixed: BTreeMap<String, String>,
    timed_out: Vec<String>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.fixed.insert(program.into(), stdout.into());
        self
    }

    pub fn with_queue<I, S>(self, program: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        if let Ok(mut queued) = self.queued.lock() {
            queued
                .entry(program)
                .or_default()
                .extend(outputs.into_iter().map(Into::into));
        }
        self
    }

    /// Every run of `program` reports a watchdog kill.
    pub fn timing_out(mut self, program: impl Into<String>) -> Self {
        self.timed_out.push(program.into());
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|s| s.argv.first().map(String::as_str) == Some(program))
            .count()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        let program = spec.argv.first().ok_or(AdapterError::EmptyArgv)?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        if self.timed_out.iter().any(|p| p == program) {
            return Ok(RunResult {
                exit_code: None,
                timed_out: true,
                stdout: Vec::new(),
            });
        }

        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.get_mut(program).and_then(VecDeque::pop_front));
        let stdout = match queued.or_else(|| self.fixed.get(program).cloned()) {
            Some(out) => out,
            None => {
                return Err(anyhow::anyhow!("failed to spawn {:?}: not scripted", spec.argv).into());
            }
        };

        Ok(RunResult {
            exit_code: Some(0),
            timed_out: false,
            stdout: stdout.into_bytes(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeHostProbe {
    pub host: HostInfo,
}

impl Default for FakeHostProbe {
    fn default() -> Self {
        Self {
            host: HostInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu_count: Some(8),
                hostname: None,
            },
        }
    }
}

impl HostProbe for FakeHostProbe {
    fn probe(&self) -> HostInfo {
        self.host.clone()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Default for FixedClock {
    fn default() -> Self {
        Self("2026-01-01T00:00:00Z".to_string())
    }
}

impl Clock for FixedClock {
    fn now_rfc3339(&self) -> String {
        self.0.clone()
    }
}
