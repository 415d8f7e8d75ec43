//! Prediction result returned to clients

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudLabel {
    #[serde(rename = "Fraud")]
    Fraud,
    #[serde(rename = "Not Fraud")]
    NotFraud,
}

impl FraudLabel {
    /// Label a fraud probability; the threshold itself is not fraud
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            FraudLabel::Fraud
        } else {
            FraudLabel::NotFraud
        }
    }
}

impl fmt::Display for FraudLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FraudLabel::Fraud => write!(f, "Fraud"),
            FraudLabel::NotFraud => write!(f, "Not Fraud"),
        }
    }
}

/// Label plus the raw positive-class probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: FraudLabel,
    pub probability: f64,
}

impl Prediction {
    pub fn new(probability: f64, threshold: f64) -> Self {
        Self {
            prediction: FraudLabel::from_probability(probability, threshold),
            probability,
        }
    }

    pub fn is_fraud(&self) -> bool {
        self.prediction == FraudLabel::Fraud
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(FraudLabel::from_probability(0.6, 0.6), FraudLabel::NotFraud);
        assert_eq!(FraudLabel::from_probability(0.6000001, 0.6), FraudLabel::Fraud);
        assert_eq!(FraudLabel::from_probability(0.0, 0.6), FraudLabel::NotFraud);
        assert_eq!(FraudLabel::from_probability(1.0, 0.6), FraudLabel::Fraud);
    }

    #[test]
    fn test_prediction_wire_format() {
        let json = serde_json::to_value(Prediction::new(0.25, 0.6)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"prediction": "Not Fraud", "probability": 0.25})
        );

        let fraud = Prediction::new(0.9, 0.6);
        assert!(fraud.is_fraud());
        assert_eq!(fraud.prediction.to_string(), "Fraud");
    }
}
