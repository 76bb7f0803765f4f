#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    stdout: String,
    metric_count: u8,
    round: u32,
}

fuzz_target!(|input: Input| {
    let metrics: Vec<String> = (0..input.metric_count % 8).map(|i| format!("m{i}")).collect();

    if let Ok(values) =
        benchgate_app::parse_metric_lines(&input.stdout, &metrics, "./fuzz", input.round)
    {
        assert_eq!(values.len(), metrics.len());
    }
});
