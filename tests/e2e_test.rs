use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use solcast::api::CoinGeckoClient;
use solcast::config::{AssetConfig, CoinGeckoConfig};
use solcast::dashboard::{Outlook, PredictionClient};
use solcast::model::ModelRegistry;
use solcast::synthetic::{MarketScenario, SyntheticDataGenerator};
use solcast::PredictionService;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn fixture_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tiny_model.json")
}

fn asset(symbol: &str, token: &str, model_path: PathBuf) -> AssetConfig {
    AssetConfig {
        symbol: symbol.to_string(),
        token: token.to_string(),
        coin_id: symbol.to_string(),
        model_path,
    }
}

/// 90 daily uptrend periods ending 2024-03-01, in CoinGecko's wire format
fn coingecko_bodies() -> (String, String) {
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let candles = SyntheticDataGenerator::new(7).generate(MarketScenario::Uptrend, 90, end);

    let ohlc: Vec<Value> = candles
        .iter()
        .map(|c| json!([c.timestamp.timestamp_millis(), c.open, c.high, c.low, c.close]))
        .collect();
    let volumes: Vec<Value> = candles
        .iter()
        .map(|c| json!([c.timestamp.timestamp_millis(), c.volume]))
        .collect();
    let prices: Vec<Value> = candles
        .iter()
        .map(|c| json!([c.timestamp.timestamp_millis(), c.close]))
        .collect();

    (
        Value::Array(ohlc).to_string(),
        json!({ "prices": prices, "total_volumes": volumes }).to_string(),
    )
}

async fn mock_coingecko() -> ServerGuard {
    let mut server = Server::new_async().await;
    let (ohlc, chart) = coingecko_bodies();
    let query = || {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("vs_currency".into(), "usd".into()),
            Matcher::UrlEncoded("days".into(), "90".into()),
        ])
    };

    server
        .mock("GET", "/coins/solana/ohlc")
        .match_query(query())
        .with_header("content-type", "application/json")
        .with_body(ohlc)
        .create_async()
        .await;
    server
        .mock("GET", "/coins/solana/market_chart")
        .match_query(query())
        .with_header("content-type", "application/json")
        .with_body(chart)
        .create_async()
        .await;
    server
        .mock("GET", "/coins/broken/ohlc")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    server
}

/// Start the API on an ephemeral port backed by the mocked provider
async fn spawn_app(coingecko_url: String) -> String {
    let assets = vec![
        asset("solana", "SOL", fixture_model()),
        asset("bitcoin", "BTC", PathBuf::from("models/does_not_exist.json")),
        asset("broken", "BRK", fixture_model()),
    ];

    let models = assert_ok!(ModelRegistry::load(&assets));
    let provider = assert_ok!(CoinGeckoClient::new(CoinGeckoConfig {
        base_url: coingecko_url,
        max_retries: 1,
        rate_limit_rpm: 600,
        ..CoinGeckoConfig::default()
    }));
    let service = Arc::new(PredictionService::new(Arc::new(provider), models, assets));

    let listener = assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
    let addr = assert_ok!(listener.local_addr());
    tokio::spawn(async move {
        axum::serve(listener, solcast::server::router(service)).await.ok();
    });

    format!("http://{}", addr)
}

async fn get(url: String) -> (u16, Value) {
    let response = assert_ok!(reqwest::get(url).await);
    let status = response.status().as_u16();
    let body = assert_ok!(response.json::<Value>().await);
    (status, body)
}

#[tokio::test]
async fn test_predict_endpoint_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();

    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/predict/solana", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["token"], "SOL");
    assert_eq!(body["prediction_date"], "2024-03-02");
    // base 100 + close >= 100 (2.0) + rsi_14 == 100 (1.5)
    assert_eq!(body["predicted_high"], 103.5);
}

#[tokio::test]
async fn test_predict_accepts_ticker_case_insensitively() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/predict/sol", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["token"], "SOL");
}

#[tokio::test]
async fn test_unknown_symbol_is_404() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/predict/dogecoin", base)).await;

    assert_eq!(status, 404);
    assert_eq!(body["detail"], "Unknown symbol: dogecoin");
}

#[tokio::test]
async fn test_missing_model_is_500_model_not_active() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/predict/bitcoin", base)).await;

    assert_eq!(status, 500);
    assert_eq!(body["detail"], "Model not active");
}

#[tokio::test]
async fn test_provider_failure_is_503() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/predict/broken", base)).await;

    assert_eq!(status, 503);
    assert!(body["detail"].as_str().unwrap().starts_with("Data provider error"));
}

#[tokio::test]
async fn test_health_lists_loaded_models() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;

    let (status, body) = get(format!("{}/health", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models"], json!(["broken", "solana"]));
}

#[tokio::test]
async fn test_dashboard_client_against_running_api() {
    let coingecko = mock_coingecko().await;
    let base = spawn_app(coingecko.url()).await;
    let client = assert_ok!(PredictionClient::new(&base, 8));

    let prediction = assert_ok!(client.predict("solana").await);
    assert_eq!(prediction.predicted_high, 103.5);
    // Today's high in the synthetic series is 239.5
    assert_eq!(
        Outlook::compare(prediction.predicted_high, 239.5),
        Outlook::Bearish(136.0)
    );

    assert_err!(client.predict("bitcoin").await);
}
