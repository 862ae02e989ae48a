use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use solcast::api::{CoinGeckoClient, KrakenClient};
use solcast::dashboard::{DashboardView, PredictionClient};
use solcast::model::ModelRegistry;
use solcast::synthetic::{MarketScenario, SyntheticDataGenerator};
use solcast::{FeatureEngineer, OhlcvFrame, PredictionService, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "solcast=info";

#[derive(Parser)]
#[command(name = "solcast")]
#[command(about = "Next-day high prediction service and market dashboard", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./solcast.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction API
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Predict the next-day high once and print it
    Predict {
        /// Asset symbol or ticker (e.g. solana, SOL)
        symbol: String,
    },

    /// Run the feature transform over a JSON file or synthetic data
    Features {
        /// JSON array of OHLCV records
        #[arg(short, long, conflicts_with = "synthetic")]
        input: Option<PathBuf>,

        /// Number of synthetic daily periods to generate
        #[arg(short, long)]
        synthetic: Option<usize>,

        #[arg(long, value_enum, default_value = "uptrend")]
        scenario: MarketScenario,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of trailing rows to print
        #[arg(long, default_value = "5")]
        tail: usize,
    },

    /// Show live market data and, optionally, the model prediction
    Dashboard {
        /// Kraken pair (e.g. SOLUSD)
        #[arg(long)]
        pair: Option<String>,

        /// Symbol passed to the prediction API
        #[arg(long)]
        symbol: Option<String>,

        /// Request a prediction from the API
        #[arg(long)]
        predict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { port } => serve(settings, port).await,
        Commands::Predict { symbol } => predict(settings, &symbol).await,
        Commands::Features {
            input,
            synthetic,
            scenario,
            seed,
            tail,
        } => features(input.as_deref(), synthetic, scenario, seed, tail),
        Commands::Dashboard {
            pair,
            symbol,
            predict,
        } => dashboard(settings, pair, symbol, predict).await,
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(settings: &Settings) -> Result<PredictionService> {
    let models = ModelRegistry::load(&settings.assets).context("failed to load models")?;
    if models.is_empty() {
        tracing::warn!("⚠️ No models loaded; every prediction will report \"Model not active\"");
    }

    let provider = CoinGeckoClient::new(settings.coingecko.clone()).context("failed to build CoinGecko client")?;

    Ok(
        PredictionService::new(Arc::new(provider), models, settings.assets.clone())
            .with_history_days(settings.coingecko.history_days),
    )
}

async fn serve(settings: Settings, port: Option<u16>) -> Result<()> {
    tracing::info!("🚀 solcast prediction API starting");

    let service = Arc::new(build_service(&settings)?);
    let addr = format!("{}:{}", settings.server.host, port.unwrap_or(settings.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    solcast::server::serve(listener, service).await.context("server error")?;
    tracing::info!("👋 Shut down cleanly");
    Ok(())
}

async fn predict(settings: Settings, symbol: &str) -> Result<()> {
    let service = build_service(&settings)?;
    let result = service
        .predict(symbol)
        .await
        .with_context(|| format!("prediction for {} failed", symbol))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn features(
    input: Option<&Path>,
    synthetic: Option<usize>,
    scenario: MarketScenario,
    seed: u64,
    tail: usize,
) -> Result<()> {
    let frame = match (input, synthetic) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            let records: Vec<Map<String, Value>> =
                serde_json::from_str(&raw).context("input must be a JSON array of objects")?;
            OhlcvFrame::from_records(&records)?
        }
        (None, Some(n)) => {
            let candles = SyntheticDataGenerator::new(seed).generate(scenario, n, Utc::now());
            OhlcvFrame::from_candles(&candles)
        }
        (None, None) => anyhow::bail!("pass either --input FILE or --synthetic N"),
    };

    let table = FeatureEngineer::new().transform(&frame)?;
    tracing::info!("Transformed {} input rows into {} feature rows", frame.len(), table.len());
    if table.has_missing() {
        tracing::warn!("⚠️ Feature table still has missing values (too little history to fill)");
    }

    for row in table.rows().skip(table.len().saturating_sub(tail)) {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

async fn dashboard(settings: Settings, pair: Option<String>, symbol: Option<String>, predict: bool) -> Result<()> {
    let mut config = settings.dashboard.clone();
    if let Some(pair) = pair {
        config.pair = pair;
    }
    if let Some(symbol) = symbol {
        config.symbol = symbol;
    }

    let kraken = KrakenClient::new(settings.kraken.clone()).context("failed to build Kraken client")?;
    let predictor = if predict {
        Some(PredictionClient::new(&config.api_url, config.timeout_secs).context("failed to build API client")?)
    } else {
        None
    };

    let view = DashboardView::load(&kraken, predictor.as_ref(), &config).await;
    print!("{}", view);
    Ok(())
}
