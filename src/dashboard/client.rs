use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::DashboardError;
use crate::models::PredictionResult;

/// HTTP client for the prediction API
#[derive(Clone)]
pub struct PredictionClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

impl PredictionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, DashboardError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET /predict/{symbol}
    pub async fn predict(&self, symbol: &str) -> Result<PredictionResult, DashboardError> {
        let url = format!("{}/predict/{}", self.base_url, symbol);
        tracing::debug!("Requesting prediction from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or(body);
            return Err(DashboardError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response.json().await?)
    }
}
