//! Type definitions for the claim fraud prediction service

pub mod claim;
pub mod prediction;

pub use claim::{Cell, ClaimRecord};
pub use prediction::{FraudLabel, Prediction};
