//! Claim Fraud Prediction API - Main Entry Point
//!
//! Loads the trained classifier once and serves `POST /predict`.

use anyhow::Result;
use claim_fraud_api::{config::AppConfig, models::inference::Predictor, server};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration decides the log level and format, so it comes first
    let config = AppConfig::load()?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("claim_fraud_api={}", config.logging.level).parse()?)
        .add_directive("tower_http=info".parse()?);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    info!("Starting Claim Fraud Prediction API");
    info!(
        "Model: {}, feature info: {}, threshold: {:.2}",
        config.model.model_path, config.model.feature_info_path, config.detection.threshold
    );

    let predictor = Arc::new(Predictor::from_config(&config)?);
    info!(
        "Predictor ready ({} features: {:?})",
        predictor.extractor().feature_count(),
        predictor.extractor().feature_names()
    );

    server::serve(&config, predictor).await?;

    info!("Claim Fraud Prediction API shut down");
    Ok(())
}
