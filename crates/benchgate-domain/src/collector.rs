//! Sample Collector: one shuffled, strictly sequential pass over the round's members.

use crate::history::SampleHistories;
use benchgate_error::ExecutionError;
use benchgate_types::Candidate;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::debug;

/// Produces one observation per metric for a single invocation of a candidate.
///
/// Values are in metric order and already oriented so that larger is better.
/// Implementations must block until the observation is complete: the collector
/// relies on at most one measurement being in flight.
pub trait SampleSource {
    fn sample(
        &mut self,
        candidate: &Candidate,
        metrics: &[String],
        round: u32,
    ) -> Result<Vec<f64>, ExecutionError>;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn sample(
        &mut self,
        candidate: &Candidate,
        metrics: &[String],
        round: u32,
    ) -> Result<Vec<f64>, ExecutionError> {
        (**self).sample(candidate, metrics, round)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn sample(
        &mut self,
        candidate: &Candidate,
        metrics: &[String],
        round: u32,
    ) -> Result<Vec<f64>, ExecutionError> {
        (**self).sample(candidate, metrics, round)
    }
}

pub struct SampleCollector<S, R> {
    source: S,
    rng: R,
    invocations: BTreeMap<Candidate, u32>,
}

impl<S: SampleSource, R: Rng> SampleCollector<S, R> {
    pub fn new(source: S, rng: R) -> Self {
        Self {
            source,
            rng,
            invocations: BTreeMap::new(),
        }
    }

    /// Run every member once, in a freshly shuffled order, appending to `histories`.
    ///
    /// Returns the visitation order. The first failing invocation aborts the round.
    pub fn collect_round(
        &mut self,
        members: &[Candidate],
        metrics: &[String],
        round: u32,
        histories: &mut SampleHistories,
    ) -> Result<Vec<Candidate>, ExecutionError> {
        let mut order = members.to_vec();
        order.shuffle(&mut self.rng);

        for candidate in &order {
            let values = self.source.sample(candidate, metrics, round)?;
            *self.invocations.entry(candidate.clone()).or_insert(0) += 1;

            if values.len() < metrics.len() {
                return Err(ExecutionError::MissingLine {
                    candidate: candidate.to_string(),
                    metric: metrics[values.len()].clone(),
                    line: values.len() + 1,
                    round,
                });
            }

            debug!(round, candidate = %candidate, values = ?&values[..metrics.len()], "sampled");
            histories.append(candidate, &values[..metrics.len()]);
        }

        Ok(order)
    }

    /// Invocations per candidate so far.
    pub fn invocations(&self) -> &BTreeMap<Candidate, u32> {
        &self.invocations
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_parts(self) -> (S, BTreeMap<Candidate, u32>) {
        (self.source, self.invocations)
    }
}
