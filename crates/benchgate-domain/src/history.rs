//! Append-only per-(candidate, metric) sample sequences.

use benchgate_types::Candidate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleHistories {
    metric_count: usize,
    // candidate -> metric index -> samples in round order
    series: BTreeMap<Candidate, Vec<Vec<f64>>>,
}

impl SampleHistories {
    pub fn new<'a>(metric_count: usize, members: impl IntoIterator<Item = &'a Candidate>) -> Self {
        let series = members
            .into_iter()
            .map(|c| (c.clone(), vec![Vec::new(); metric_count]))
            .collect();
        Self {
            metric_count,
            series,
        }
    }

    /// Append one observation per metric. `values` must hold exactly one value per metric.
    pub(crate) fn append(&mut self, candidate: &Candidate, values: &[f64]) {
        let n = self.metric_count;
        debug_assert_eq!(values.len(), n);
        let per_metric = self
            .series
            .entry(candidate.clone())
            .or_insert_with(|| vec![Vec::new(); n]);
        for (seq, v) in per_metric.iter_mut().zip(values) {
            seq.push(*v);
        }
    }

    /// Samples of `candidate` on the metric at `metric_index`; empty if never sampled.
    pub fn samples(&self, candidate: &Candidate, metric_index: usize) -> &[f64] {
        self.series
            .get(candidate)
            .and_then(|per_metric| per_metric.get(metric_index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of rounds `candidate` took part in.
    pub fn len(&self, candidate: &Candidate) -> usize {
        self.samples(candidate, 0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(|m| m.iter().all(Vec::is_empty))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.series.keys()
    }
}
