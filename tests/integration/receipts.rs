use benchgate_app::{CompareRequest, CompareUseCase, github_annotations, render_markdown};
use benchgate_fake::{FakeHostProbe, FakeProcessRunner, FixedClock};
use benchgate_types::{CompareReceipt, GateStatus, MetricSpec, Status, ToolInfo};

fn compare(runner: FakeProcessRunner, candidates: &[&str], metrics: Vec<MetricSpec>) -> CompareReceipt {
    CompareUseCase::new(runner, FakeHostProbe::default(), FixedClock::default())
        .skip_executable_check()
        .execute(CompareRequest {
            baseline: "./default".into(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            metrics,
            min_rounds: 5,
            max_rounds: 10,
            alpha: 0.02,
            timeout: None,
            seed: Some(99),
            gate: Some("movegen".into()),
            tool: ToolInfo {
                name: "benchgate".into(),
                version: "0.0.0".into(),
            },
        })
        .expect("comparison runs")
}

#[test]
fn receipt_survives_a_json_round_trip_with_unbounded_statistics() {
    let runner = FakeProcessRunner::new()
        .with_stdout("./default", "1000\n")
        .with_stdout("./tested", "2000\n");
    let receipt = compare(runner, &["./tested"], vec![MetricSpec::higher("perft")]);

    let pair = &receipt.candidates["./tested"].metrics["perft"];
    assert_eq!(pair.status, Status::Accepted);
    let test = pair.last_test.expect("tested at round 5");
    assert_eq!(test.t_statistic, None);
    assert_eq!(test.p_value, 0.0);

    let json = serde_json::to_string(&receipt).expect("serialize");
    assert!(!json.contains("null"), "non-finite values leaked: {json}");
    let back: CompareReceipt = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, receipt);
}

#[test]
fn mixed_outcomes_produce_a_failing_gate_and_annotations() {
    let runner = FakeProcessRunner::new()
        .with_stdout("./default", "1000\n300\n")
        .with_stdout("./faster", "1500\n300\n")
        .with_stdout("./leaner", "1000\n200\n")
        .with_stdout("./bloated", "1000\n900\n");
    let receipt = compare(
        runner,
        &["./faster", "./leaner", "./bloated"],
        vec![MetricSpec::higher("nps"), MetricSpec::lower("rss_mb")],
    );

    let statuses = receipt.statuses();
    assert_eq!(statuses["./faster"]["nps"], Status::Accepted);
    assert_eq!(statuses["./faster"]["rss_mb"], Status::Pending);
    assert_eq!(statuses["./leaner"]["rss_mb"], Status::Accepted);
    assert_eq!(statuses["./bloated"]["rss_mb"], Status::Rejected);
    assert_eq!(receipt.verdict.status, GateStatus::Fail);

    // Means are reported in the units the programs printed.
    let bloated = &receipt.candidates["./bloated"].metrics["rss_mb"];
    assert_eq!(bloated.history.summary.mean, 900.0);
    assert_eq!(receipt.baseline.metrics["rss_mb"].summary.mean, 300.0);

    let md = render_markdown(&receipt);
    assert!(md.contains("`./bloated` | `rss_mb` (lower) | 300 | 900 | +200.00%"));

    let annotations = github_annotations(&receipt);
    assert!(annotations
        .iter()
        .any(|l| l.starts_with("::error::benchgate ./bloated rss_mb: rejected at round 5")));
    assert!(annotations.iter().all(|l| !l.contains("./faster nps")));
}
