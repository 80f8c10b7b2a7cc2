//! Training metadata and its inheritance down the phase tree.
//!
//! A curriculum starts from the configured root metadata. Each curriculum and
//! phase carries a `MetadataOverride` holding only the fields it sets; the
//! effective metadata of a phase is its parent's effective metadata with
//! those fields replaced.

use serde::{Deserialize, Serialize};

use crate::core::summarizer::Summarizer;
use crate::error::{Result, SyllabusError};

/// Convergence and scheduling parameters for one phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingMetadata {
    /// Convergence a behavior must reach for the phase to succeed (0..1).
    pub success_fraction: f64,
    /// Number of recent runs kept in each convergence window.
    pub sample_size: usize,
    /// Pass ceiling for an automation loop.
    pub maximum_attempts: u64,
    /// Execution weight of a fully converged behavior (0..1).
    pub minimum_dynamic_weight: f64,
    /// Execution weight of a behavior with zero convergence (0..1).
    pub maximum_dynamic_weight: f64,
    /// Reduction applied to each convergence window.
    pub summarizer: Summarizer,
}

impl Default for TrainingMetadata {
    fn default() -> Self {
        Self {
            success_fraction: 0.9,
            sample_size: 100,
            maximum_attempts: 10_000,
            minimum_dynamic_weight: 1.0,
            maximum_dynamic_weight: 1.0,
            summarizer: Summarizer::Mean,
        }
    }
}

impl TrainingMetadata {
    /// Return a copy with the override's explicit fields applied.
    pub fn apply(&self, overrides: &MetadataOverride) -> Self {
        Self {
            success_fraction: overrides.success_fraction.unwrap_or(self.success_fraction),
            sample_size: overrides.sample_size.unwrap_or(self.sample_size),
            maximum_attempts: overrides.maximum_attempts.unwrap_or(self.maximum_attempts),
            minimum_dynamic_weight: overrides
                .minimum_dynamic_weight
                .unwrap_or(self.minimum_dynamic_weight),
            maximum_dynamic_weight: overrides
                .maximum_dynamic_weight
                .unwrap_or(self.maximum_dynamic_weight),
            summarizer: overrides.summarizer.unwrap_or(self.summarizer),
        }
    }

    /// Check that every field is in range and the weight bounds are ordered.
    pub fn validate(&self) -> Result<()> {
        if !is_unit(self.success_fraction) {
            return Err(SyllabusError::model(format!(
                "success_fraction {} is outside 0..1",
                self.success_fraction
            )));
        }
        if self.sample_size == 0 {
            return Err(SyllabusError::model("sample_size must be positive"));
        }
        if !is_unit(self.minimum_dynamic_weight) || !is_unit(self.maximum_dynamic_weight) {
            return Err(SyllabusError::model(format!(
                "dynamic weights {}..{} must be within 0..1",
                self.minimum_dynamic_weight, self.maximum_dynamic_weight
            )));
        }
        if self.minimum_dynamic_weight > self.maximum_dynamic_weight {
            return Err(SyllabusError::model(format!(
                "minimum_dynamic_weight {} exceeds maximum_dynamic_weight {}",
                self.minimum_dynamic_weight, self.maximum_dynamic_weight
            )));
        }
        self.summarizer.validate()
    }
}

/// The success standard of a phase: reach `fraction` over the last `of` runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceStandard {
    pub fraction: f64,
    pub of: usize,
}

/// Explicitly overridden metadata fields of one curriculum or phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetadataOverride {
    pub success_fraction: Option<f64>,
    pub sample_size: Option<usize>,
    pub maximum_attempts: Option<u64>,
    pub minimum_dynamic_weight: Option<f64>,
    pub maximum_dynamic_weight: Option<f64>,
    pub summarizer: Option<Summarizer>,
}

impl MetadataOverride {
    /// Check the explicitly set fields. Ordering of the weight bounds is
    /// only checked on resolved metadata, since a bound may be inherited.
    pub fn validate(&self, owner: &str) -> Result<()> {
        let fractions = [
            ("success_fraction", self.success_fraction),
            ("minimum_dynamic_weight", self.minimum_dynamic_weight),
            ("maximum_dynamic_weight", self.maximum_dynamic_weight),
        ];
        for (field, value) in fractions {
            if let Some(v) = value {
                if !is_unit(v) {
                    return Err(SyllabusError::model(format!(
                        "{owner}: {field} {v} is outside 0..1"
                    )));
                }
            }
        }
        if self.sample_size == Some(0) {
            return Err(SyllabusError::model(format!(
                "{owner}: sample_size must be positive"
            )));
        }
        if let Some(summarizer) = self.summarizer {
            match summarizer.validate() {
                Err(SyllabusError::Model { message }) => {
                    return Err(SyllabusError::model(format!("{owner}: {message}")));
                }
                other => other?,
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn set_standard(&mut self, standard: ConvergenceStandard) {
        self.success_fraction = Some(standard.fraction);
        self.sample_size = Some(standard.of);
    }
}

fn is_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
