//! Fitted artifacts: the standardization scaler and the binary classifier.
//!
//! Both are serialized as JSON and validated structurally after
//! deserialization, so a malformed artifact is rejected at load time
//! rather than surfacing as garbage predictions later.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ArtifactError;
use crate::pipeline::FEATURE_COUNT;

/// A fitted per-feature standardization transform.
///
/// `transform` applies `(x - mean) / scale` element-wise using the
/// statistics learned during training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    /// Artifact format version for compatibility
    pub version: u32,
    /// Per-feature centering terms
    pub means: Vec<f64>,
    /// Per-feature scaling terms
    pub scales: Vec<f64>,
}

impl Scaler {
    /// Validate the artifact structure against the fitted feature shape.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.means.len() != FEATURE_COUNT {
            return Err(ArtifactError::Validation(format!(
                "scaler has {} means, expected {FEATURE_COUNT}",
                self.means.len()
            )));
        }
        if self.scales.len() != FEATURE_COUNT {
            return Err(ArtifactError::Validation(format!(
                "scaler has {} scales, expected {FEATURE_COUNT}",
                self.scales.len()
            )));
        }
        if let Some(idx) = self.means.iter().position(|m| !m.is_finite()) {
            return Err(ArtifactError::Validation(format!(
                "scaler mean {idx} is not finite"
            )));
        }
        if let Some(idx) = self
            .scales
            .iter()
            .position(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(ArtifactError::Validation(format!(
                "scaler scale {idx} is not finite and non-zero"
            )));
        }
        Ok(())
    }

    /// Standardize one feature vector. Fails if the result degenerates
    /// to a non-finite value.
    pub fn transform(&self, features: &[f64; FEATURE_COUNT]) -> Result<[f64; FEATURE_COUNT], String> {
        let mut standardized = [0.0_f64; FEATURE_COUNT];
        for (idx, value) in features.iter().enumerate() {
            let z = (value - self.means[idx]) / self.scales[idx];
            if !z.is_finite() {
                return Err(format!("feature {idx} standardized to a non-finite value"));
            }
            standardized[idx] = z;
        }
        Ok(standardized)
    }
}

/// A fitted binary logistic-regression classifier.
///
/// `predict` maps a standardized feature vector to label 1
/// (disease present) or 0 (disease absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier {
    /// Artifact format version for compatibility
    pub version: u32,
    /// Per-feature coefficients
    pub weights: Vec<f64>,
    /// Learned intercept
    pub intercept: f64,
    /// Decision threshold on the positive-class probability
    pub threshold: f64,
}

impl Classifier {
    /// Validate the artifact structure against the fitted feature shape.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(ArtifactError::Validation(format!(
                "classifier has {} weights, expected {FEATURE_COUNT}",
                self.weights.len()
            )));
        }
        if let Some(idx) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(ArtifactError::Validation(format!(
                "classifier weight {idx} is not finite"
            )));
        }
        if !self.intercept.is_finite() {
            return Err(ArtifactError::Validation(
                "classifier intercept is not finite".to_string(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ArtifactError::Validation(format!(
                "classifier threshold {} is outside (0, 1)",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Classify one standardized feature vector.
    pub fn predict(&self, standardized: &[f64; FEATURE_COUNT]) -> Result<u8, String> {
        let mut score = self.intercept;
        for (weight, value) in self.weights.iter().zip(standardized.iter()) {
            score += weight * value;
        }
        let probability = 1.0 / (1.0 + (-score).exp());
        if !probability.is_finite() {
            return Err("classifier produced a non-finite probability".to_string());
        }
        Ok(if probability >= self.threshold { 1 } else { 0 })
    }
}

/// Both fitted artifacts, loaded together at process start.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub scaler: Scaler,
    pub classifier: Classifier,
}

impl ModelBundle {
    /// Load and validate both artifacts from disk.
    pub fn load<P: AsRef<Path>>(scaler_path: P, classifier_path: P) -> Result<Self, ArtifactError> {
        let scaler: Scaler = load_json(scaler_path.as_ref())?;
        scaler.validate()?;
        let classifier: Classifier = load_json(classifier_path.as_ref())?;
        classifier.validate()?;
        Ok(Self { scaler, classifier })
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}
