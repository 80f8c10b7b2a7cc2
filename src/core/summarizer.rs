//! Summarizers: reduce a window of scores to one convergence value.
//!
//! All summarizers map values in 0..1 to a value in 0..1 and treat an
//! empty input as zero convergence.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyllabusError};

/// How a tracker window is reduced to a single convergence measure.
///
/// In configuration files the variant is named by `kind`:
///
/// ```toml
/// [training.summarizer]
/// kind = "power_mean"
/// exponent = 0.5
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summarizer {
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Generalized power mean. Exponents below 1 lean towards the minimum
    /// (soft AND), above 1 towards the maximum (soft OR); 0 is the
    /// geometric mean.
    PowerMean { exponent: f64 },
    /// Linearly interpolated quantile, `q` in 0..1.
    Percentile { q: f64 },
    /// Fraction of values at or above `threshold`.
    PassRate { threshold: f64 },
    /// Mean minus `penalty` times the population standard deviation.
    PenalizedMean { penalty: f64 },
}

impl Summarizer {
    /// Soft AND: `strictness` 0 is the plain mean, larger is closer to min.
    pub fn soft_and(strictness: f64) -> Self {
        Self::PowerMean {
            exponent: 1.0 - strictness.max(0.0),
        }
    }

    /// Soft OR: `leniency` 0 is the plain mean, larger is closer to max.
    pub fn soft_or(leniency: f64) -> Self {
        Self::PowerMean {
            exponent: 1.0 + leniency.max(0.0),
        }
    }

    /// Check the variant's parameter.
    pub fn validate(&self) -> Result<()> {
        let (name, value, ok) = match *self {
            Self::Mean => return Ok(()),
            Self::PowerMean { exponent } => ("exponent", exponent, exponent.is_finite()),
            Self::Percentile { q } => ("q", q, (0.0..=1.0).contains(&q)),
            Self::PassRate { threshold } => {
                ("threshold", threshold, (0.0..=1.0).contains(&threshold))
            }
            Self::PenalizedMean { penalty } => {
                ("penalty", penalty, penalty.is_finite() && penalty >= 0.0)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(SyllabusError::model(format!(
                "summarizer {name} {value} is out of range"
            )))
        }
    }

    pub fn summarize(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let value = match *self {
            Self::Mean => mean(values),
            Self::PowerMean { exponent } => power_mean(values, exponent),
            Self::Percentile { q } => percentile(values, q),
            Self::PassRate { threshold } => {
                values.iter().filter(|&&v| v >= threshold).count() as f64 / values.len() as f64
            }
            Self::PenalizedMean { penalty } => {
                let m = mean(values);
                let variance =
                    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
                m - penalty * variance.sqrt()
            }
        };
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn power_mean(values: &[f64], exponent: f64) -> f64 {
    // Any zero drives a non-positive power mean to zero.
    if exponent <= 0.0 && values.iter().any(|&v| v <= 0.0) {
        return 0.0;
    }
    if exponent == 0.0 {
        return (values.iter().map(|v| v.ln()).sum::<f64>() / values.len() as f64).exp();
    }
    let sum = values.iter().map(|v| v.powf(exponent)).sum::<f64>();
    (sum / values.len() as f64).powf(1.0 / exponent)
}

fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
