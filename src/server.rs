//! HTTP surface: `POST /predict`

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::models::inference::Predictor;
use crate::types::claim::ClaimRecord;
use crate::types::prediction::Prediction;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
}

/// Request body of `POST /predict`
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: ClaimRecord,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Build the application router
pub fn router(predictor: Arc<Predictor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(predict))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { predictor })
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &AppConfig, predictor: Arc<Predictor>) -> Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(address = %addr, "Listening for prediction requests");

    axum::serve(listener, router(predictor))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

/// The body is parsed by hand so malformed JSON and a missing `features`
/// key answer with the same `{"error": ...}` shape as every other failure.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);

    // Inference waits on the session lock, so it stays off the reactor threads
    let predictor = state.predictor.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            let request: PredictRequest = serde_json::from_slice(&body)
                .map_err(|e| PredictError::InvalidRequest(e.to_string()))?;
            predictor.predict(&request.features)
        })
    })
    .await
    .unwrap_or_else(|e| {
        Err(PredictError::Inference(
            anyhow::Error::new(e).context("Prediction task failed"),
        ))
    });

    match outcome {
        Ok(prediction) => {
            info!(
                %request_id,
                probability = prediction.probability,
                label = %prediction.prediction,
                "Fraud probability"
            );
            Json::<Prediction>(prediction).into_response()
        }
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!(%request_id, status, error = %e, "Prediction failed");
            } else {
                warn!(%request_id, status, error = %e, "Prediction rejected");
            }
            e.into_response()
        }
    }
}
