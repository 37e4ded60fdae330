use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::constants::{CONTENT_TYPE_HEADER, CONTENT_TYPE_JSON};
use crate::error::AdsError;
use crate::models::CampaignMetrics;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
}

impl From<ChatError> for AdsError {
    fn from(error: ChatError) -> Self {
        AdsError::ChatService(error.to_string())
    }
}

/// Forwards normalized campaign metrics to the AI chat service.
pub struct ChatUploader {
    client: Client,
    timeout: Duration,
    upload_url: String,
}

impl ChatUploader {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            upload_url: format!("{}/api/data/upload", base_url.trim_end_matches('/')),
        }
    }

    pub fn payload(metrics: &CampaignMetrics) -> Value {
        json!({
            "source": "ad-metrics",
            "provider": metrics.source_provider,
            "campaignId": metrics.campaign_id,
            "metrics": metrics,
        })
    }

    pub async fn upload_metrics(&self, metrics: &CampaignMetrics) -> Result<(), ChatError> {
        let response = self
            .client
            .post(&self.upload_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE_JSON)
            .json(&Self::payload(metrics))
            .send()
            .await
            .map_err(|e| ChatError::RequestError(e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Rejected(format!("{}: {}", status, error_text)));
        }

        info!(campaign_id = %metrics.campaign_id, "Campaign metrics uploaded to chat service");
        Ok(())
    }
}
