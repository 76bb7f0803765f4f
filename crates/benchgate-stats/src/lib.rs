//! Descriptive statistics over sample sequences.
//!
//! All functions are total: empty or too-short inputs yield `None` instead of NaN.

use benchgate_types::SampleSummary;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with Bessel's correction (divides by N - 1).
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation with Bessel's correction.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// First two moments of a sequence, as consumed by two-sample tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub n: usize,
    pub mean: f64,
    pub variance: f64,
}

impl Moments {
    /// Requires at least two values.
    pub fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            n: values.len(),
            mean: mean(values)?,
            variance: sample_variance(values)?,
        })
    }

    /// Squared standard error of the mean.
    pub fn sem_squared(&self) -> f64 {
        self.variance / self.n as f64
    }
}

/// Summarize a sequence. `std_dev` is omitted below two samples.
pub fn summarize(values: &[f64]) -> Option<SampleSummary> {
    Some(SampleSummary {
        n: values.len() as u32,
        mean: mean(values)?,
        std_dev: sample_std_dev(values),
    })
}
