//! Per-(candidate, metric) classification table.

use benchgate_significance::{Verdict, WelchTest};
use benchgate_types::{Candidate, Status};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairState {
    pub status: Status,
    pub decided_at_round: Option<u32>,
    pub last_test: Option<WelchTest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusTable {
    pairs: BTreeMap<Candidate, Vec<PairState>>,
}

impl StatusTable {
    /// Every candidate starts pending on every metric.
    pub fn new<'a>(candidates: impl IntoIterator<Item = &'a Candidate>, metric_count: usize) -> Self {
        let pairs = candidates
            .into_iter()
            .map(|c| (c.clone(), vec![PairState::default(); metric_count]))
            .collect();
        Self { pairs }
    }

    pub fn state(&self, candidate: &Candidate, metric_index: usize) -> Option<&PairState> {
        self.pairs.get(candidate)?.get(metric_index)
    }

    pub fn status(&self, candidate: &Candidate, metric_index: usize) -> Option<Status> {
        self.state(candidate, metric_index).map(|s| s.status)
    }

    /// Record a test of `candidate` (as A) against the baseline (as B).
    ///
    /// Returns the new status if this call decided the pair. Decided pairs are
    /// final: later calls leave them untouched.
    pub fn record(
        &mut self,
        candidate: &Candidate,
        metric_index: usize,
        verdict: Verdict,
        test: WelchTest,
        round: u32,
    ) -> Option<Status> {
        let state = self.pairs.get_mut(candidate)?.get_mut(metric_index)?;
        if state.status.is_decided() {
            return None;
        }
        state.last_test = Some(test);
        let next = match verdict {
            Verdict::ABetter => Status::Accepted,
            Verdict::BBetter => Status::Rejected,
            Verdict::NoDifference => return None,
        };
        state.status = next;
        state.decided_at_round = Some(round);
        Some(next)
    }

    /// Indices of the metrics `candidate` is still pending on.
    pub fn pending_metrics(&self, candidate: &Candidate) -> Vec<usize> {
        self.pairs
            .get(candidate)
            .map(|states| {
                states
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.status.is_decided())
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_fully_decided(&self, candidate: &Candidate) -> bool {
        self.pairs
            .get(candidate)
            .is_some_and(|states| states.iter().all(|s| s.status.is_decided()))
    }

    pub fn into_pairs(self) -> BTreeMap<Candidate, Vec<PairState>> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with_p(p: f64) -> WelchTest {
        WelchTest {
            t_statistic: 1.0,
            degrees_of_freedom: 8.0,
            p_value: p,
        }
    }

    #[test]
    fn starts_pending_everywhere() {
        let a = Candidate::new("a");
        let t = StatusTable::new([&a], 2);
        assert_eq!(t.status(&a, 0), Some(Status::Pending));
        assert_eq!(t.status(&a, 1), Some(Status::Pending));
        assert_eq!(t.pending_metrics(&a), vec![0, 1]);
        assert!(!t.is_fully_decided(&a));
    }

    #[test]
    fn no_difference_keeps_pending_but_remembers_the_test() {
        let a = Candidate::new("a");
        let mut t = StatusTable::new([&a], 1);
        assert_eq!(t.record(&a, 0, Verdict::NoDifference, test_with_p(0.4), 5), None);
        let s = t.state(&a, 0).unwrap();
        assert_eq!(s.status, Status::Pending);
        assert_eq!(s.decided_at_round, None);
        assert_eq!(s.last_test.unwrap().p_value, 0.4);
    }

    #[test]
    fn decisions_are_final() {
        let a = Candidate::new("a");
        let mut t = StatusTable::new([&a], 2);

        assert_eq!(
            t.record(&a, 0, Verdict::ABetter, test_with_p(0.001), 5),
            Some(Status::Accepted)
        );
        // A later opposite verdict must not move it.
        assert_eq!(t.record(&a, 0, Verdict::BBetter, test_with_p(0.0001), 6), None);
        let s = t.state(&a, 0).unwrap();
        assert_eq!(s.status, Status::Accepted);
        assert_eq!(s.decided_at_round, Some(5));
        assert_eq!(s.last_test.unwrap().p_value, 0.001);

        assert!(!t.is_fully_decided(&a));
        assert_eq!(t.pending_metrics(&a), vec![1]);

        t.record(&a, 1, Verdict::BBetter, test_with_p(0.01), 7);
        assert!(t.is_fully_decided(&a));
        assert_eq!(t.status(&a, 1), Some(Status::Rejected));
    }

    #[test]
    fn unknown_candidate_is_ignored() {
        let a = Candidate::new("a");
        let mut t = StatusTable::new([&a], 1);
        let ghost = Candidate::new("ghost");
        assert_eq!(t.record(&ghost, 0, Verdict::ABetter, test_with_p(0.0), 5), None);
        assert!(!t.is_fully_decided(&ghost));
        assert!(t.pending_metrics(&ghost).is_empty());
    }
}
