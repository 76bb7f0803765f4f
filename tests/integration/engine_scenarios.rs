use benchgate_domain::{
    run_comparison, ComparisonPlan, DomainError, EngineConfig, SequentialEngine,
};
use benchgate_error::ExecutionError;
use benchgate_fake::ScriptedSampleSource;
use benchgate_types::{Candidate, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn plan(candidates: &[&str], metrics: &[&str]) -> ComparisonPlan {
    ComparisonPlan::new(
        Candidate::new("./base"),
        candidates.iter().map(|c| Candidate::new(*c)).collect(),
        metrics.iter().map(|m| m.to_string()).collect(),
    )
    .expect("valid plan")
}

fn config(min_rounds: u32, max_rounds: u32) -> EngineConfig {
    EngineConfig::new(min_rounds, max_rounds, 0.02).expect("valid config")
}

#[test]
fn doubled_score_is_accepted_by_round_five() {
    let mut source = ScriptedSampleSource::new()
        .constant("./base", [1000.0])
        .constant("./tested", [2000.0]);

    let outcome = run_comparison(
        config(5, 10),
        plan(&["./tested"], &["perft"]),
        &mut source,
        StdRng::seed_from_u64(11),
    )
    .expect("run completes");

    let tested = Candidate::new("./tested");
    assert_eq!(outcome.status(&tested, "perft"), Some(Status::Accepted));
    let decided = outcome
        .pair(&tested, "perft")
        .and_then(|p| p.decided_at_round)
        .expect("decided");
    assert!(decided <= 5, "decided at round {decided}");
    assert_eq!(outcome.rounds, 5);
    assert_eq!(source.invocations_of("./tested"), 5);
}

#[test]
fn identical_programs_stay_pending_through_max_rounds() {
    let mut source = ScriptedSampleSource::new()
        .constant("./base", [1000.0])
        .constant("./tested", [1000.0]);

    let outcome = run_comparison(
        config(5, 10),
        plan(&["./tested"], &["perft"]),
        &mut source,
        StdRng::seed_from_u64(12),
    )
    .expect("inconclusive is not an error");

    assert_eq!(outcome.rounds, 10);
    assert_eq!(
        outcome.status(&Candidate::new("./tested"), "perft"),
        Some(Status::Pending)
    );
    assert_eq!(source.invocations_of("./tested"), 10);
    assert_eq!(source.invocations_of("./base"), 10);
}

#[test]
fn malformed_output_in_round_three_aborts_the_run() {
    let mut source = ScriptedSampleSource::new()
        .constant("./base", [1000.0])
        .constant("./tested", [1000.0])
        .fail_at("./tested", 3, "perft: n/a");

    let result = run_comparison(
        config(5, 10),
        plan(&["./tested"], &["perft"]),
        &mut source,
        StdRng::seed_from_u64(13),
    );

    match result {
        Err(DomainError::Execution(ExecutionError::NotAnInteger {
            candidate, round, ..
        })) => {
            assert_eq!(candidate, "./tested");
            assert_eq!(round, 3);
        }
        other => panic!("expected an execution error, got {other:?}"),
    }
    // Nothing past the failing round ran.
    assert!(source.calls().iter().all(|c| c.round <= 3));
}

#[test]
fn decided_status_never_changes() {
    // perft is decided at round 5; after that the candidate's perft collapses,
    // while "search" stays tied and keeps the candidate in the active set.
    let mut runs = vec![vec![2000.0, 50.0]; 5];
    runs.push(vec![0.0, 50.0]);
    let source = ScriptedSampleSource::new()
        .constant("./base", [1000.0, 50.0])
        .sequence("./tested", runs);

    let tested = Candidate::new("./tested");
    let mut engine = SequentialEngine::new(
        config(5, 10),
        plan(&["./tested"], &["perft", "search"]),
        source,
        StdRng::seed_from_u64(14),
    );

    let mut rounds_after_decision = 0;
    while let Some(report) = engine.step().expect("round completes") {
        if report.round >= 5 {
            assert_eq!(engine.status(&tested, "perft"), Some(Status::Accepted));
            assert_eq!(engine.status(&tested, "search"), Some(Status::Pending));
        }
        if report.round > 5 {
            rounds_after_decision += 1;
            assert!(report.decisions.is_empty());
        }
    }

    assert_eq!(rounds_after_decision, 5);
    assert_eq!(engine.active(), &[tested.clone()]);
    let outcome = engine.into_outcome();
    assert_eq!(
        outcome.pair(&tested, "perft").and_then(|p| p.decided_at_round),
        Some(5)
    );
}

#[test]
fn retired_candidates_are_not_executed_again() {
    let mut source = ScriptedSampleSource::new()
        .constant("./base", [1000.0])
        .constant("./fast", [4000.0])
        .constant("./slow", [10.0])
        .constant("./same", [1000.0]);

    let outcome = run_comparison(
        config(5, 10),
        plan(&["./fast", "./slow", "./same"], &["perft"]),
        &mut source,
        StdRng::seed_from_u64(15),
    )
    .expect("run completes");

    assert_eq!(outcome.rounds, 10);
    assert_eq!(source.rounds_of("./fast"), vec![1, 2, 3, 4, 5]);
    assert_eq!(source.rounds_of("./slow"), vec![1, 2, 3, 4, 5]);
    assert_eq!(source.rounds_of("./same"), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.rounds_of("./base"), (1..=10).collect::<Vec<_>>());
    assert_eq!(
        outcome.status(&Candidate::new("./slow"), "perft"),
        Some(Status::Rejected)
    );
}

#[test]
fn loop_terminates_by_max_rounds_for_noisy_inputs() {
    let mut rng = StdRng::seed_from_u64(16);
    for trial in 0..50u64 {
        let noisy = |rng: &mut StdRng, centre: f64| -> Vec<Vec<f64>> {
            (0..10)
                .map(|_| vec![centre + rng.gen_range(-50.0..50.0)])
                .collect()
        };
        let base_runs = noisy(&mut rng, 1000.0);
        let cand_runs = noisy(&mut rng, 1000.0 + (trial as f64) * 2.0);
        let mut source = ScriptedSampleSource::new()
            .sequence("./base", base_runs)
            .sequence("./tested", cand_runs);

        let outcome = run_comparison(
            config(5, 10),
            plan(&["./tested"], &["perft"]),
            &mut source,
            StdRng::seed_from_u64(trial),
        )
        .expect("run completes");

        assert!(outcome.rounds >= 5 && outcome.rounds <= 10, "trial {trial}");
        assert!(source.invocations_of("./base") <= 10);
    }
}
