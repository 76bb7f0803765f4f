//! Two-sample significance testing for benchmark comparison.
//!
//! [`compare`] runs Welch's unequal-variance t-test and turns the two-tailed
//! p-value into a [`Verdict`]. Larger means are always "better"; callers that
//! track lower-is-better quantities negate their observations first.

use benchgate_error::SignificanceError;
use benchgate_stats::Moments;
use benchgate_types::TestSummary;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Outcome of comparing sequence A against sequence B.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Mean of A is significantly larger.
    ABetter,
    /// Mean of B is significantly larger.
    BBetter,
    NoDifference,
}

impl Verdict {
    /// The verdict seen from the other side of the comparison.
    pub fn flipped(self) -> Self {
        match self {
            Verdict::ABetter => Verdict::BBetter,
            Verdict::BBetter => Verdict::ABetter,
            Verdict::NoDifference => Verdict::NoDifference,
        }
    }
}

/// Result of Welch's t-test.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WelchTest {
    pub t_statistic: f64,
    /// Welch-Satterthwaite degrees of freedom.
    pub degrees_of_freedom: f64,
    /// Two-tailed.
    pub p_value: f64,
}

impl From<WelchTest> for TestSummary {
    fn from(t: WelchTest) -> Self {
        TestSummary {
            t_statistic: t.t_statistic.is_finite().then_some(t.t_statistic),
            degrees_of_freedom: t.degrees_of_freedom,
            p_value: t.p_value,
        }
    }
}

/// Full comparison detail: the verdict plus the moments and test it came from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Comparison {
    pub verdict: Verdict,
    pub a: Moments,
    pub b: Moments,
    pub test: WelchTest,
}

fn moments(values: &[f64]) -> Result<Moments, SignificanceError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SignificanceError::NonFiniteSample);
    }
    Moments::of(values).ok_or(SignificanceError::InsufficientSamples { len: values.len() })
}

fn welch_from_moments(a: &Moments, b: &Moments) -> WelchTest {
    let sa = a.sem_squared();
    let sb = b.sem_squared();
    let se2 = sa + sb;
    let diff = a.mean - b.mean;

    // Both sequences constant: the statistic is undefined when the means agree
    // and unbounded when they don't.
    if se2 == 0.0 {
        let df = (a.n + b.n - 2) as f64;
        return if diff == 0.0 {
            WelchTest {
                t_statistic: 0.0,
                degrees_of_freedom: df,
                p_value: 1.0,
            }
        } else {
            WelchTest {
                t_statistic: diff.signum() * f64::INFINITY,
                degrees_of_freedom: df,
                p_value: 0.0,
            }
        };
    }

    let t = diff / se2.sqrt();
    let df = se2 * se2 / (sa * sa / (a.n - 1) as f64 + sb * sb / (b.n - 1) as f64);

    // df is positive and finite once se2 > 0; fall back to "no evidence" otherwise.
    let p = StudentsT::new(0.0, 1.0, df)
        .map(|dist| (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
        .unwrap_or(1.0);

    WelchTest {
        t_statistic: t,
        degrees_of_freedom: df,
        p_value: p,
    }
}

/// Welch's t-test for the difference of means of `a` and `b`.
///
/// Each sequence needs at least two finite samples.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<WelchTest, SignificanceError> {
    let ma = moments(a)?;
    let mb = moments(b)?;
    Ok(welch_from_moments(&ma, &mb))
}

/// Compare `a` against `b` at significance level `alpha`, keeping the test detail.
pub fn compare_detailed(
    a: &[f64],
    b: &[f64],
    alpha: f64,
) -> Result<Comparison, SignificanceError> {
    let ma = moments(a)?;
    let mb = moments(b)?;
    let test = welch_from_moments(&ma, &mb);

    let verdict = if test.p_value < alpha {
        if ma.mean > mb.mean {
            Verdict::ABetter
        } else {
            Verdict::BBetter
        }
    } else {
        Verdict::NoDifference
    };

    Ok(Comparison {
        verdict,
        a: ma,
        b: mb,
        test,
    })
}

/// Compare `a` against `b` at significance level `alpha`.
///
/// ```
/// use benchgate_significance::{compare, Verdict};
///
/// let candidate = [2000.0; 5];
/// let baseline = [1000.0; 5];
/// assert_eq!(compare(&candidate, &baseline, 0.02).unwrap(), Verdict::ABetter);
/// ```
pub fn compare(a: &[f64], b: &[f64], alpha: f64) -> Result<Verdict, SignificanceError> {
    compare_detailed(a, b, alpha).map(|c| c.verdict)
}
