//! Claim Fraud Prediction Library
//!
//! Reconstructs the fixed feature vector a pre-trained claims fraud
//! classifier expects from loosely specified JSON input, scores it with
//! ONNX Runtime and serves the result over HTTP.

pub mod config;
pub mod encoder;
pub mod error;
pub mod feature_extractor;
pub mod models;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::PredictError;
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::inference::{Classifier, Predictor};
pub use types::{claim::ClaimRecord, prediction::Prediction};
