//! Sequential Decision Engine: the round loop and its termination policy.

use crate::collector::{SampleCollector, SampleSource};
use crate::config::{ComparisonPlan, EngineConfig};
use crate::history::SampleHistories;
use crate::status::{PairState, StatusTable};
use crate::DomainError;
use benchgate_significance::compare_detailed;
use benchgate_types::{Candidate, Status};
use rand::Rng;
use std::collections::BTreeMap;
use std::iter;
use tracing::{info, info_span};

/// A pair that left `pending` during a round.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub candidate: Candidate,
    pub metric: String,
    pub status: Status,
}

/// What one call to [`SequentialEngine::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: u32,
    /// Members in the order they were executed.
    pub visited: Vec<Candidate>,
    /// False while the round counter is below the minimum.
    pub tested: bool,
    pub decisions: Vec<Decision>,
    /// Candidates decided on every metric this round; they will not run again.
    pub retired: Vec<Candidate>,
}

/// Final state of a comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub rounds: u32,
    pub baseline: Candidate,
    pub metrics: Vec<String>,
    /// Non-baseline candidates in declaration order.
    pub candidates: Vec<Candidate>,
    pub pairs: BTreeMap<Candidate, Vec<PairState>>,
    pub histories: SampleHistories,
    pub invocations: BTreeMap<Candidate, u32>,
}

impl Outcome {
    /// candidate -> metric -> final status. `pending` means inconclusive.
    pub fn statuses(&self) -> BTreeMap<Candidate, BTreeMap<String, Status>> {
        self.pairs
            .iter()
            .map(|(candidate, states)| {
                let per_metric = self
                    .metrics
                    .iter()
                    .cloned()
                    .zip(states.iter().map(|s| s.status))
                    .collect();
                (candidate.clone(), per_metric)
            })
            .collect()
    }

    pub fn status(&self, candidate: &Candidate, metric: &str) -> Option<Status> {
        self.pair(candidate, metric).map(|p| p.status)
    }

    pub fn pair(&self, candidate: &Candidate, metric: &str) -> Option<&PairState> {
        let idx = self.metrics.iter().position(|m| m == metric)?;
        self.pairs.get(candidate)?.get(idx)
    }

    pub fn invocations_of(&self, candidate: &Candidate) -> u32 {
        self.invocations.get(candidate).copied().unwrap_or(0)
    }
}

/// Drives the collector round by round and classifies each (candidate, metric) pair.
///
/// The engine exclusively owns histories and statuses for one run; build a new
/// engine for every comparison.
pub struct SequentialEngine<S, R> {
    config: EngineConfig,
    plan: ComparisonPlan,
    collector: SampleCollector<S, R>,
    histories: SampleHistories,
    table: StatusTable,
    active: Vec<Candidate>,
    round: u32,
    finished: bool,
}

impl<S: SampleSource, R: Rng> SequentialEngine<S, R> {
    pub fn new(config: EngineConfig, plan: ComparisonPlan, source: S, rng: R) -> Self {
        let members: Vec<&Candidate> = iter::once(plan.baseline())
            .chain(plan.candidates())
            .collect();
        let histories = SampleHistories::new(plan.metrics().len(), members);
        let table = StatusTable::new(plan.candidates(), plan.metrics().len());
        let active = plan.candidates().to_vec();
        Self {
            config,
            plan,
            collector: SampleCollector::new(source, rng),
            histories,
            table,
            active,
            round: 0,
            finished: false,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Candidates still being executed.
    pub fn active(&self) -> &[Candidate] {
        &self.active
    }

    pub fn histories(&self) -> &SampleHistories {
        &self.histories
    }

    pub fn status(&self, candidate: &Candidate, metric: &str) -> Option<Status> {
        let idx = self.plan.metrics().iter().position(|m| m == metric)?;
        self.table.status(candidate, idx)
    }

    pub fn invocations(&self) -> &BTreeMap<Candidate, u32> {
        self.collector.invocations()
    }

    /// Run one round. Returns `None` once the loop has terminated.
    pub fn step(&mut self) -> Result<Option<RoundReport>, DomainError> {
        if self.finished {
            return Ok(None);
        }

        self.round += 1;
        let round = self.round;
        let _span = info_span!("round", round).entered();
        info!(active = self.active.len(), "starting round");

        let members: Vec<Candidate> = iter::once(self.plan.baseline().clone())
            .chain(self.active.iter().cloned())
            .collect();
        let visited = self.collector.collect_round(
            &members,
            self.plan.metrics(),
            round,
            &mut self.histories,
        )?;

        let tested = round >= self.config.min_rounds();
        let mut decisions = Vec::new();
        let mut retired = Vec::new();

        if tested {
            let active = self.active.clone();
            for candidate in &active {
                for idx in self.table.pending_metrics(candidate) {
                    if let Some(d) = self.evaluate(candidate, idx, round)? {
                        decisions.push(d);
                    }
                }
            }

            let (next, done): (Vec<Candidate>, Vec<Candidate>) = self
                .active
                .iter()
                .cloned()
                .partition(|c| !self.table.is_fully_decided(c));
            self.active = next;
            retired = done;
        }

        if self.active.is_empty() || round >= self.config.max_rounds() {
            self.finished = true;
            info!(
                remaining = self.active.len(),
                "comparison finished after {round} rounds"
            );
        }

        Ok(Some(RoundReport {
            round,
            visited,
            tested,
            decisions,
            retired,
        }))
    }

    fn evaluate(
        &mut self,
        candidate: &Candidate,
        idx: usize,
        round: u32,
    ) -> Result<Option<Decision>, DomainError> {
        let metric = &self.plan.metrics()[idx];
        let ours = self.histories.samples(candidate, idx);
        let base = self.histories.samples(self.plan.baseline(), idx);

        let cmp = compare_detailed(ours, base, self.config.alpha())?;
        info!(
            candidate = %candidate,
            metric = %metric,
            mean = cmp.a.mean,
            std_dev = cmp.a.variance.sqrt(),
            n = cmp.a.n,
            baseline_mean = cmp.b.mean,
            baseline_std_dev = cmp.b.variance.sqrt(),
            baseline_n = cmp.b.n,
            t = cmp.test.t_statistic,
            p = cmp.test.p_value,
            "significance test"
        );

        let decided = self
            .table
            .record(candidate, idx, cmp.verdict, cmp.test, round)
            .map(|status| {
                info!(candidate = %candidate, metric = %metric, %status, "pair decided");
                Decision {
                    candidate: candidate.clone(),
                    metric: metric.clone(),
                    status,
                }
            });
        Ok(decided)
    }

    /// Step until the loop terminates.
    pub fn run(mut self) -> Result<Outcome, DomainError> {
        while self.step()?.is_some() {}
        Ok(self.into_outcome())
    }

    /// Consume the engine, keeping whatever was recorded so far.
    pub fn into_outcome(self) -> Outcome {
        let (_, invocations) = self.collector.into_parts();
        Outcome {
            rounds: self.round,
            baseline: self.plan.baseline().clone(),
            metrics: self.plan.metrics().to_vec(),
            candidates: self.plan.candidates().to_vec(),
            pairs: self.table.into_pairs(),
            histories: self.histories,
            invocations,
        }
    }
}

/// Run a complete comparison.
///
/// Either every round completes and the full (possibly partly pending) result is
/// returned, or the first error aborts the run and nothing is returned.
pub fn run_comparison<S: SampleSource, R: Rng>(
    config: EngineConfig,
    plan: ComparisonPlan,
    source: S,
    rng: R,
) -> Result<Outcome, DomainError> {
    SequentialEngine::new(config, plan, source, rng).run()
}
