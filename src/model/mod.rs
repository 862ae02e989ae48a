// Trained model loading and inference
pub mod xgboost;

pub use xgboost::TreeEnsemble;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AssetConfig;
use crate::features::FeatureVector;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("unsupported model: {0}")]
    Unsupported(String),

    #[error("model expects features {expected:?}, pipeline produces {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Interface for a trained regressor over the fixed feature layout
pub trait Regressor: Send + Sync {
    /// Predict a scalar target from one feature row
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError>;

    /// Get model name/type
    fn name(&self) -> &str;
}

/// Models loaded at start-up, keyed by asset symbol
///
/// Built once and then only read; clones share the same models.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn Regressor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, symbol: &str, model: Arc<dyn Regressor>) -> Self {
        self.models.insert(symbol.to_lowercase(), model);
        self
    }

    /// Load the model of every configured asset
    ///
    /// A missing file leaves the asset without a model (requests for it are
    /// answered as not ready); a file that exists but cannot be loaded is an
    /// error.
    pub fn load(assets: &[AssetConfig]) -> Result<Self, ModelError> {
        let mut registry = Self::new();

        for asset in assets {
            if !asset.model_path.exists() {
                tracing::warn!(
                    "❌ Model not found for {} at {}",
                    asset.symbol,
                    asset.model_path.display()
                );
                continue;
            }

            let model = TreeEnsemble::from_file(&asset.model_path)?;
            tracing::info!(
                "✅ Loaded model for {}: {} ({} trees)",
                asset.symbol,
                asset.model_path.display(),
                model.tree_count()
            );
            registry = registry.with_model(&asset.symbol, Arc::new(model));
        }

        Ok(registry)
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<dyn Regressor>> {
        self.models.get(&symbol.to_lowercase())
    }

    /// Symbols with a loaded model, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.models.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
