// HTTP surface of the prediction service
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::models::PredictionResult;
use crate::prediction::{PredictionError, PredictionService};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    models: Vec<String>,
}

impl PredictionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictionError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
            PredictionError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            PredictionError::ModelNotReady(_)
            | PredictionError::Transform(_)
            | PredictionError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// GET /predict/{symbol} predicts the next-period high
async fn predict(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<PredictionResult>, PredictionError> {
    match state.service.predict(&symbol).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!("❌ Prediction for {} failed: {}", symbol, e);
            Err(e)
        }
    }
}

/// GET /health lists the assets with a loaded model
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models: state.service.models().symbols(),
    })
}

pub fn router(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/predict/{symbol}", get(predict))
        .route("/health", get(health))
        .with_state(AppState { service })
}

/// Serve until ctrl-c
pub async fn serve(listener: TcpListener, service: Arc<PredictionService>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("🌐 Prediction API listening on http://{}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
