use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given
const DEFAULT_CONFIG_FILE: &str = "solcast";
const ENV_PREFIX: &str = "SOLCAST";

/// Layered settings: defaults, then an optional TOML file, then
/// `SOLCAST__SECTION__KEY` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
    #[serde(default)]
    pub kraken: KrakenConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    /// Demo API key, sent as `x_cg_demo_api_key` when set
    pub api_key: Option<String>,
    pub vs_currency: String,
    /// Days of history requested per prediction (never below 90)
    pub history_days: u32,
    pub rate_limit_rpm: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            vs_currency: "usd".to_string(),
            history_days: 90,
            rate_limit_rpm: 30, // Demo API: 30 requests per minute
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KrakenConfig {
    pub base_url: String,
    /// Candle interval in minutes (1440 = daily)
    pub interval_minutes: u32,
    pub timeout_secs: u64,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kraken.com".to_string(),
            interval_minutes: 1440,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the prediction API
    pub api_url: String,
    pub symbol: String,
    pub pair: String,
    pub timeout_secs: u64,
    /// Number of most recent periods shown in the chart table
    pub chart_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            symbol: "solana".to_string(),
            pair: "SOLUSD".to_string(),
            timeout_secs: 8,
            chart_rows: 14,
        }
    }
}

/// A predictable asset and where its model lives
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AssetConfig {
    /// Path segment accepted by `/predict/{symbol}`
    pub symbol: String,
    /// Ticker reported in the prediction result
    pub token: String,
    /// CoinGecko coin id used for history
    pub coin_id: String,
    pub model_path: PathBuf,
}

impl AssetConfig {
    /// Case-insensitive match on symbol or ticker
    pub fn matches(&self, requested: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(requested) || self.token.eq_ignore_ascii_case(requested)
    }
}

fn default_assets() -> Vec<AssetConfig> {
    vec![AssetConfig {
        symbol: "solana".to_string(),
        token: "SOL".to_string(),
        coin_id: "solana".to_string(),
        model_path: PathBuf::from("models/xgboost_solana_v1.json"),
    }]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            coingecko: CoinGeckoConfig::default(),
            kraken: KrakenConfig::default(),
            dashboard: DashboardConfig::default(),
            assets: default_assets(),
        }
    }
}

impl Settings {
    /// Load settings; an explicit `path` must exist, the default file is optional
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let cfg = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }

    pub fn find_asset(&self, requested: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.matches(requested))
    }
}
