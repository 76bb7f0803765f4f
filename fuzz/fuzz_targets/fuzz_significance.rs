//! Structure-aware fuzzing for Welch's t-test.
//!
//! Samples are generated as `i32` and widened, which keeps the sums finite the
//! way realistic metric values do.

#![no_main]

use arbitrary::Arbitrary;
use benchgate_significance::{Verdict, compare_detailed};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    a: Vec<i32>,
    b: Vec<i32>,
    alpha_percent: u8,
}

fuzz_target!(|input: Input| {
    let a: Vec<f64> = input.a.iter().map(|&v| f64::from(v)).collect();
    let b: Vec<f64> = input.b.iter().map(|&v| f64::from(v)).collect();
    let alpha = f64::from(input.alpha_percent.clamp(1, 50)) / 100.0;

    let Ok(forward) = compare_detailed(&a, &b, alpha) else {
        return;
    };
    assert!((0.0..=1.0).contains(&forward.test.p_value));

    // Swapping the sides flips the verdict and nothing else.
    let backward = compare_detailed(&b, &a, alpha).expect("same inputs, swapped");
    assert_eq!(backward.verdict, forward.verdict.flipped());
    if forward.verdict != Verdict::NoDifference {
        assert!(forward.test.p_value < alpha);
    }
});
