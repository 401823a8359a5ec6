//! Pre-trained inference artifacts and the prediction pipeline.
//!
//! Two fitted artifacts are loaded once at process start: a per-feature
//! standardization scaler and a binary logistic-regression classifier.
//! The pipeline turns raw form fields into a diagnosis outcome, or a
//! typed error that the HTTP boundary renders as a user-visible notice.

pub mod artifacts;
pub mod errors;
pub mod pipeline;

pub use artifacts::{Classifier, ModelBundle, Scaler};
pub use errors::{ArtifactError, PredictError};
pub use pipeline::{Diagnosis, DisplayTag, Outcome, Pipeline, FEATURE_COUNT};
