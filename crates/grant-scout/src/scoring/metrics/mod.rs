//! Metric calculators for the five scored dimensions.
//!
//! Each calculator is a pure function over an opportunity record, the table
//! set, and an optional applicant profile. Missing inputs never error; they
//! produce a [`Calculation::Degraded`] carrying a neutral fallback and the
//! reason the full formula could not run.

pub mod competition;
pub mod hidden;
pub mod roi;
pub mod success;
pub mod timing;

use crate::scoring::domain::ScoreBreakdown;

/// Outcome of one metric calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum Calculation {
    /// The full formula ran on complete inputs.
    Computed(ScoreBreakdown),
    /// Inputs were missing; the breakdown holds a documented fallback.
    Degraded {
        breakdown: ScoreBreakdown,
        reason: String,
    },
}

impl Calculation {
    /// Wrap a fallback breakdown, recording the reason both in the variant
    /// and as an `error` component so it survives serialization.
    pub fn degraded(breakdown: ScoreBreakdown, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Degraded {
            breakdown: breakdown.with_component("error", reason.clone()),
            reason,
        }
    }

    pub fn breakdown(&self) -> &ScoreBreakdown {
        match self {
            Self::Computed(breakdown) | Self::Degraded { breakdown, .. } => breakdown,
        }
    }

    pub fn into_breakdown(self) -> ScoreBreakdown {
        match self {
            Self::Computed(breakdown) | Self::Degraded { breakdown, .. } => breakdown,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Degraded { reason, .. } => Some(reason.as_str()),
            Self::Computed(_) => None,
        }
    }
}

pub(crate) fn clamp(value: f64, low: f64, high: f64) -> f64 {
    value.max(low).min(high)
}

/// Error function via Abramowitz and Stegun 7.1.26, accurate to ~1.5e-7.
pub(crate) fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal CDF expressed through [`erf`].
pub(crate) fn normal_cdf(x: f64, mean: f64, stddev: f64) -> f64 {
    if stddev <= 0.0 {
        return if x < mean { 0.0 } else { 1.0 };
    }
    0.5 * (1.0 + erf((x - mean) / (stddev * std::f64::consts::SQRT_2)))
}
