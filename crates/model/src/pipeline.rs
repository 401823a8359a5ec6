//! The prediction pipeline: raw form fields in, diagnosis outcome out.

use std::sync::Arc;

use crate::artifacts::ModelBundle;
use crate::errors::PredictError;

/// Number of clinical features the artifacts were fitted on.
/// Positional order is a contract with the trained artifacts.
pub const FEATURE_COUNT: usize = 13;

/// Binary diagnosis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    Positive,
    Negative,
}

/// Presentation state paired with the diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTag {
    Alert,
    Ok,
}

impl DisplayTag {
    /// CSS class the page renderer attaches to the result line.
    pub fn css_class(&self) -> &'static str {
        match self {
            DisplayTag::Alert => "result-alert",
            DisplayTag::Ok => "result-ok",
        }
    }
}

/// One completed prediction, rendered and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub diagnosis: Diagnosis,
    pub tag: DisplayTag,
}

impl Outcome {
    pub fn message(&self) -> &'static str {
        match self.diagnosis {
            Diagnosis::Positive => "Patient Diagnosed With Heart Disease",
            Diagnosis::Negative => "Patient Not Diagnosed With Heart Disease",
        }
    }
}

/// Stateless prediction pipeline over the loaded artifacts.
///
/// When artifact loading failed at startup the pipeline runs degraded:
/// every call fails with `ModelsUnavailable` without reading input.
#[derive(Debug, Clone)]
pub struct Pipeline {
    bundle: Option<Arc<ModelBundle>>,
}

impl Pipeline {
    pub fn new(bundle: Option<ModelBundle>) -> Self {
        Self {
            bundle: bundle.map(Arc::new),
        }
    }

    /// Whether both artifacts loaded and predictions can be served.
    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    /// Run one prediction over raw submitted form fields, in submission
    /// order.
    ///
    /// Exactly [`FEATURE_COUNT`] numeric values are required; over-length
    /// input is rejected rather than truncated, since truncation would
    /// silently discard submitted data.
    pub fn predict(&self, fields: &[(String, String)]) -> Result<Outcome, PredictError> {
        let bundle = self.bundle.as_ref().ok_or(PredictError::ModelsUnavailable)?;

        let mut values = Vec::with_capacity(fields.len());
        for (name, raw) in fields {
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PredictError::InvalidInput {
                    field: name.clone(),
                })?;
            values.push(value);
        }

        if values.len() != FEATURE_COUNT {
            return Err(PredictError::FeatureCountMismatch {
                expected: FEATURE_COUNT,
                actual: values.len(),
            });
        }

        let mut features = [0.0_f64; FEATURE_COUNT];
        features.copy_from_slice(&values);

        let standardized = bundle
            .scaler
            .transform(&features)
            .map_err(PredictError::Transform)?;
        let label = bundle
            .classifier
            .predict(&standardized)
            .map_err(PredictError::Transform)?;

        Ok(if label == 1 {
            Outcome {
                diagnosis: Diagnosis::Positive,
                tag: DisplayTag::Alert,
            }
        } else {
            Outcome {
                diagnosis: Diagnosis::Negative,
                tag: DisplayTag::Ok,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Classifier, Scaler};

    fn fields(values: &[&str]) -> Vec<(String, String)> {
        values
            .iter()
            .enumerate()
            .map(|(idx, v)| (format!("f{idx}"), v.to_string()))
            .collect()
    }

    fn ready_pipeline() -> Pipeline {
        Pipeline::new(Some(ModelBundle {
            scaler: Scaler {
                version: 1,
                means: vec![0.0; FEATURE_COUNT],
                scales: vec![1.0; FEATURE_COUNT],
            },
            classifier: Classifier {
                version: 1,
                weights: vec![1.0; FEATURE_COUNT],
                intercept: 0.0,
                threshold: 0.5,
            },
        }))
    }

    #[test]
    fn degraded_pipeline_fails_before_parsing() {
        let pipeline = Pipeline::new(None);
        // A field that would also fail parsing: ModelsUnavailable must win.
        let err = pipeline.predict(&fields(&["not-a-number"])).unwrap_err();
        assert!(matches!(err, PredictError::ModelsUnavailable));
    }

    #[test]
    fn non_numeric_field_is_rejected_by_name() {
        let mut input = fields(&["1"; FEATURE_COUNT]);
        input[5].1 = "abc".to_string();
        let err = ready_pipeline().predict(&input).unwrap_err();
        match err {
            PredictError::InvalidInput { field } => assert_eq!(field, "f5"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_finite_field_is_rejected() {
        let mut input = fields(&["1"; FEATURE_COUNT]);
        input[0].1 = "NaN".to_string();
        assert!(matches!(
            ready_pipeline().predict(&input).unwrap_err(),
            PredictError::InvalidInput { .. }
        ));
    }

    #[test]
    fn short_input_reports_true_count() {
        let err = ready_pipeline().predict(&fields(&["1"; 7])).unwrap_err();
        match err {
            PredictError::FeatureCountMismatch { expected, actual } => {
                assert_eq!(expected, FEATURE_COUNT);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn over_length_input_is_rejected_not_truncated() {
        let err = ready_pipeline().predict(&fields(&["1"; 15])).unwrap_err();
        assert!(matches!(
            err,
            PredictError::FeatureCountMismatch {
                expected: FEATURE_COUNT,
                actual: 15
            }
        ));
    }

    #[test]
    fn well_formed_input_yields_exactly_one_outcome() {
        let positive = ready_pipeline().predict(&fields(&["1"; FEATURE_COUNT])).unwrap();
        assert_eq!(positive.diagnosis, Diagnosis::Positive);
        assert_eq!(positive.tag, DisplayTag::Alert);
        assert_eq!(positive.message(), "Patient Diagnosed With Heart Disease");

        let negative = ready_pipeline()
            .predict(&fields(&["-1"; FEATURE_COUNT]))
            .unwrap();
        assert_eq!(negative.diagnosis, Diagnosis::Negative);
        assert_eq!(negative.tag, DisplayTag::Ok);
        assert_eq!(
            negative.message(),
            "Patient Not Diagnosed With Heart Disease"
        );
    }

    #[test]
    fn whitespace_around_values_is_tolerated() {
        let input = fields(&[" 1.5 "; FEATURE_COUNT]);
        assert!(ready_pipeline().predict(&input).is_ok());
    }
}
