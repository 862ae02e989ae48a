use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::api::{HistoryProvider, ProviderError};
use crate::config::AssetConfig;
use crate::features::{FeatureEngineer, TransformError};
use crate::model::{ModelError, ModelRegistry};
use crate::models::PredictionResult;

/// The transform needs 30 periods for its longest window; ask for three times that
pub const MIN_HISTORY_DAYS: u32 = 90;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Model not active")]
    ModelNotReady(String),

    #[error("Data provider error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Feature pipeline error: {0}")]
    Transform(#[from] TransformError),

    #[error("Inference error: {0}")]
    Inference(#[from] ModelError),
}

/// Orchestrates one prediction: history fetch, feature transform, inference
///
/// Holds only immutable state, so a single instance is shared by every
/// request handler.
pub struct PredictionService {
    provider: Arc<dyn HistoryProvider>,
    models: ModelRegistry,
    assets: Vec<AssetConfig>,
    engineer: FeatureEngineer,
    history_days: u32,
}

impl PredictionService {
    pub fn new(provider: Arc<dyn HistoryProvider>, models: ModelRegistry, assets: Vec<AssetConfig>) -> Self {
        Self {
            provider,
            models,
            assets,
            engineer: FeatureEngineer::new(),
            history_days: MIN_HISTORY_DAYS,
        }
    }

    /// Request more history per prediction; values below 90 are raised to 90
    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days.max(MIN_HISTORY_DAYS);
        self
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn find_asset(&self, requested: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.matches(requested))
    }

    /// Predict the next-period high for `symbol`
    pub async fn predict(&self, symbol: &str) -> Result<PredictionResult, PredictionError> {
        let asset = self
            .find_asset(symbol)
            .ok_or_else(|| PredictionError::UnknownSymbol(symbol.to_string()))?;

        let model = self
            .models
            .get(&asset.symbol)
            .ok_or_else(|| PredictionError::ModelNotReady(asset.symbol.clone()))?;

        let history = self
            .provider
            .fetch_history(&asset.coin_id, self.history_days)
            .await?;

        let features = self.engineer.transform(&history)?;
        let last = features.last_row().ok_or(TransformError::NoRows)?;

        let predicted_high = model.predict(&last)?;

        let last_date = match history.last_date() {
            Some(date) => date,
            None => {
                tracing::warn!(
                    "No history rows for {}, dating prediction from today",
                    asset.symbol
                );
                Utc::now()
            }
        };
        let prediction_date = (last_date + Duration::days(1)).date_naive();

        tracing::info!(
            "🔮 {} ({}): {} rows from {:?} -> predicted high {:.4} for {}",
            asset.token,
            model.name(),
            history.len(),
            self.provider.source(),
            predicted_high,
            prediction_date
        );

        Ok(PredictionResult {
            token: asset.token.clone(),
            prediction_date,
            predicted_high,
        })
    }
}
