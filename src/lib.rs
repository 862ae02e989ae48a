// Core modules
pub mod api;
pub mod config;
pub mod dashboard;
pub mod features;
pub mod model;
pub mod models;
pub mod prediction;
pub mod server;
pub mod synthetic;

// Re-export commonly used types
pub use config::Settings;
pub use features::{FeatureEngineer, FeatureTable, FeatureVector, OhlcvFrame};
pub use models::*;
pub use prediction::{PredictionError, PredictionService};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
