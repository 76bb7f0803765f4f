//! CheckUseCase - Config-driven one-command workflow.
//!
//! This module implements the `check` command which:
//! 1. Resolves a gate from a loaded config file
//! 2. Runs the sequential comparison it describes
//! 3. Renders the markdown summary
//! 4. Decides the exit code
//!
//! Writing `compare.json` and `comment.md` is left to the caller.

use crate::{exit_code_for, render_markdown, CompareRequest, CompareUseCase};
use benchgate_adapters::{Clock, HostProbe, ProcessRunner};
use benchgate_config::{resolve_gate, Overrides};
use benchgate_types::{CompareReceipt, ConfigFile, ToolInfo};
use std::path::PathBuf;

/// Request for the check use case.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// The loaded configuration file.
    pub config: ConfigFile,

    /// Name of the gate to run.
    pub gate: String,

    /// Command-line values that take precedence over the file.
    pub overrides: Overrides,

    /// If true, an inconclusive verdict fails the check.
    pub fail_on_pending: bool,

    pub tool: ToolInfo,
}

/// Outcome of the check use case.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub receipt: CompareReceipt,

    /// Where the receipt should be written.
    pub compare_path: PathBuf,

    pub markdown: String,
    pub markdown_path: PathBuf,

    /// True if the check failed (based on verdict and flags).
    pub failed: bool,

    /// Exit code to use (0=pass, 2=fail, 3=inconclusive with fail-on-pending).
    pub exit_code: i32,
}

/// Use case for running a config-driven check.
pub struct CheckUseCase<R: ProcessRunner, H: HostProbe, C: Clock> {
    compare: CompareUseCase<R, H, C>,
}

impl<R: ProcessRunner, H: HostProbe, C: Clock> CheckUseCase<R, H, C> {
    pub fn new(runner: R, host_probe: H, clock: C) -> Self {
        Self {
            compare: CompareUseCase::new(runner, host_probe, clock),
        }
    }

    pub fn skip_executable_check(mut self) -> Self {
        self.compare = self.compare.skip_executable_check();
        self
    }

    /// Execute the check workflow.
    pub fn execute(&self, req: CheckRequest) -> anyhow::Result<CheckOutcome> {
        let gate = resolve_gate(&req.config, &req.gate, &req.overrides)?;

        let receipt = self.compare.execute(CompareRequest {
            baseline: gate.baseline,
            candidates: gate.candidates,
            metrics: gate.metrics,
            min_rounds: gate.min_rounds,
            max_rounds: gate.max_rounds,
            alpha: gate.alpha,
            timeout: gate.timeout,
            seed: gate.seed,
            gate: Some(gate.name),
            tool: req.tool,
        })?;

        let markdown = render_markdown(&receipt);
        let exit_code = exit_code_for(&receipt.verdict, req.fail_on_pending);

        Ok(CheckOutcome {
            compare_path: gate.out_dir.join("compare.json"),
            markdown_path: gate.out_dir.join("comment.md"),
            receipt,
            markdown,
            failed: exit_code != 0,
            exit_code,
        })
    }
}
