//! End-to-end pipeline check with a realistic clinical record.

use heartwise_model::{Classifier, Diagnosis, DisplayTag, ModelBundle, Pipeline, Scaler, FEATURE_COUNT};

/// Standardization statistics in the ballpark of the classic
/// heart-disease training set.
fn fitted_bundle() -> ModelBundle {
    ModelBundle {
        scaler: Scaler {
            version: 1,
            means: vec![
                54.4, 0.68, 0.97, 131.6, 246.3, 0.15, 0.53, 149.6, 0.33, 1.04, 1.40, 0.73, 2.31,
            ],
            scales: vec![
                9.08, 0.47, 1.03, 17.5, 51.8, 0.36, 0.53, 22.9, 0.47, 1.16, 0.62, 1.02, 0.61,
            ],
        },
        classifier: Classifier {
            version: 1,
            weights: vec![
                -0.01, -0.86, 0.65, -0.39, -0.20, 0.05, 0.17, 0.44, -0.42, -0.39, 0.26, -0.75,
                -0.62,
            ],
            intercept: 0.14,
            threshold: 0.5,
        },
    }
}

fn sample_fields() -> Vec<(String, String)> {
    let names = [
        "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
        "slope", "ca", "thal",
    ];
    let values = [
        "63", "1", "3", "145", "233", "1", "0", "150", "0", "2.3", "0", "0", "1",
    ];
    names
        .iter()
        .zip(values.iter())
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

#[test]
fn sample_record_produces_one_of_the_two_fixed_outcomes() {
    let pipeline = Pipeline::new(Some(fitted_bundle()));
    let outcome = pipeline.predict(&sample_fields()).unwrap();

    match outcome.diagnosis {
        Diagnosis::Positive => {
            assert_eq!(outcome.tag, DisplayTag::Alert);
            assert_eq!(outcome.message(), "Patient Diagnosed With Heart Disease");
        }
        Diagnosis::Negative => {
            assert_eq!(outcome.tag, DisplayTag::Ok);
            assert_eq!(
                outcome.message(),
                "Patient Not Diagnosed With Heart Disease"
            );
        }
    }
}

#[test]
fn repeated_calls_with_identical_artifacts_are_stable() {
    let pipeline = Pipeline::new(Some(fitted_bundle()));
    let first = pipeline.predict(&sample_fields()).unwrap();
    for _ in 0..32 {
        assert_eq!(pipeline.predict(&sample_fields()).unwrap(), first);
    }
}

#[test]
fn field_count_contract_holds_for_sample_shape() {
    assert_eq!(sample_fields().len(), FEATURE_COUNT);
}
