//! Error taxonomy for the prediction path

use thiserror::Error;

/// Errors raised while turning a request into a prediction
#[derive(Debug, Error)]
pub enum PredictError {
    /// A monetary field could not be parsed as a float
    #[error("could not convert string to float: '{value}' (field {field})")]
    TypeConversion { field: String, value: String },

    /// The aligned vector does not have the width the classifier was trained on
    #[error("Feature mismatch : expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// A trained-schema column carried text the classifier cannot consume
    #[error("could not convert feature '{column}' to a number: '{value}'")]
    NonNumericFeature { column: String, value: String },

    /// The request body was not a JSON object carrying `features`
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The classifier failed to produce probabilities
    #[error("{0:#}")]
    Inference(anyhow::Error),
}

impl PredictError {
    /// HTTP status code the request boundary answers with
    pub fn status_code(&self) -> u16 {
        match self {
            PredictError::FeatureCountMismatch { .. } => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
