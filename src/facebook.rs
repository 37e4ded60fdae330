use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{
    FACEBOOK_API_VERSION, FB_ACCOUNT_FIELDS, FB_ADSET_INSIGHT_FIELDS, FB_CAMPAIGN_FIELDS,
    FB_CREATIVE_FIELDS, FB_INSIGHT_FIELDS, FB_MAX_PAGES, FB_PAGE_LIMIT,
};
use crate::error::AdsError;
use crate::http::{read_json, transport_error};
use crate::models::{AccountStatus, AdAccount, Campaign, Creative, Credential, Provider};
use crate::provider::{Breakdown, ProviderClient, RawInsightRow};
use crate::window::DateRange;

const PROVIDER: Provider = Provider::Facebook;

pub struct FacebookClient {
    client: Client,
    timeout: Duration,
    base_url: String,
}

impl FacebookClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), FACEBOOK_API_VERSION),
        }
    }

    /// GET an edge and follow `paging.next` until the vendor stops returning one.
    async fn get_all(
        &self,
        credential: &Credential,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>, AdsError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[("access_token", credential.access_token.as_str())])
            .query(&[("limit", FB_PAGE_LIMIT)])
            .query(params)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let mut page = read_json(PROVIDER, response).await?;

        let mut rows = Vec::new();
        for page_number in 1..=FB_MAX_PAGES {
            if let Some(data) = page.get("data").and_then(Value::as_array) {
                rows.extend(data.iter().cloned());
            }

            let Some(next) = page.pointer("/paging/next").and_then(Value::as_str) else {
                return Ok(rows);
            };
            if page_number == FB_MAX_PAGES {
                warn!(path, pages = FB_MAX_PAGES, "Stopping pagination at page limit");
                break;
            }

            debug!(path, page = page_number + 1, "Following Facebook pagination");
            // The next link already carries the access token and cursor.
            let response = self
                .client
                .get(next)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, e))?;
            page = read_json(PROVIDER, response).await?;
        }

        Ok(rows)
    }
}

/// Accepts both `act_123` and `123`.
pub fn account_node(account_id: &str) -> String {
    format!("act_{}", account_id.trim_start_matches("act_"))
}

pub fn time_range_param(range: &DateRange) -> String {
    format!(
        "{{'since':'{}','until':'{}'}}",
        range.since.format("%Y-%m-%d"),
        range.until.format("%Y-%m-%d")
    )
}

/// Extra insights parameters for a breakdown.
pub fn breakdown_params(breakdown: Breakdown) -> Vec<(&'static str, String)> {
    let breakdowns = match breakdown {
        Breakdown::Daily => return vec![("time_increment", "1".to_string())],
        Breakdown::Platform => "publisher_platform",
        Breakdown::Demographic => "age,gender",
        Breakdown::Country => "country",
        Breakdown::Device => "device_platform",
        Breakdown::Placement => "publisher_platform,platform_position",
    };
    vec![("breakdowns", breakdowns.to_string())]
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn date_field(value: &Value, field: &str) -> Option<NaiveDate> {
    value
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

fn parse_account(value: &Value) -> AdAccount {
    let status = if value.get("account_status").and_then(Value::as_i64) == Some(1) {
        AccountStatus::Active
    } else {
        AccountStatus::Inactive
    };

    AdAccount {
        id: str_field(value, "id")
            .map(|id| id.trim_start_matches("act_").to_string())
            .unwrap_or_default(),
        name: str_field(value, "name").unwrap_or_else(|| "Unknown".to_string()),
        status,
        currency_code: str_field(value, "currency"),
        time_zone: str_field(value, "timezone_name"),
    }
}

fn parse_campaign(value: &Value) -> Campaign {
    Campaign {
        id: str_field(value, "id").unwrap_or_default(),
        name: str_field(value, "name").unwrap_or_default(),
        status: str_field(value, "status").unwrap_or_default(),
        objective: str_field(value, "objective").unwrap_or_default(),
        start_date: date_field(value, "start_time"),
        end_date: date_field(value, "stop_time"),
        bidding_strategy: str_field(value, "bid_strategy"),
    }
}

fn parse_creative(ad: &Value) -> Creative {
    let creative = ad.get("creative").unwrap_or(&Value::Null);
    Creative {
        ad_id: str_field(ad, "id").unwrap_or_default(),
        ad_name: str_field(ad, "name"),
        id: str_field(creative, "id"),
        name: str_field(creative, "name"),
        title: str_field(creative, "title"),
        body: str_field(creative, "body"),
        image_url: str_field(creative, "image_url"),
        thumbnail_url: str_field(creative, "thumbnail_url"),
        call_to_action: str_field(creative, "call_to_action_type"),
        ad_type: None,
        final_urls: Vec::new(),
    }
}

#[async_trait]
impl ProviderClient for FacebookClient {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn list_ad_accounts(&self, credential: &Credential) -> Result<Vec<AdAccount>, AdsError> {
        let rows = self
            .get_all(
                credential,
                "me/adaccounts",
                &[("fields", FB_ACCOUNT_FIELDS.to_string())],
            )
            .await?;
        Ok(rows.iter().map(parse_account).collect())
    }

    async fn list_campaigns(
        &self,
        credential: &Credential,
        account_id: &str,
    ) -> Result<Vec<Campaign>, AdsError> {
        let path = format!("{}/campaigns", account_node(account_id));
        let rows = self
            .get_all(credential, &path, &[("fields", FB_CAMPAIGN_FIELDS.to_string())])
            .await?;
        Ok(rows.iter().map(parse_campaign).collect())
    }

    async fn get_campaign_insights(
        &self,
        credential: &Credential,
        _account_id: &str,
        campaign_id: &str,
        range: &DateRange,
        breakdown: Option<Breakdown>,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        let mut params = vec![
            ("fields", FB_INSIGHT_FIELDS.to_string()),
            ("time_range", time_range_param(range)),
        ];
        if let Some(breakdown) = breakdown {
            params.extend(breakdown_params(breakdown));
        }

        let path = format!("{}/insights", campaign_id);
        let rows = self.get_all(credential, &path, &params).await?;
        Ok(rows.into_iter().map(RawInsightRow).collect())
    }

    async fn list_ad_groups(
        &self,
        credential: &Credential,
        _account_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        let params = [
            ("fields", FB_ADSET_INSIGHT_FIELDS.to_string()),
            ("time_range", time_range_param(range)),
            ("level", "adset".to_string()),
        ];
        let path = format!("{}/insights", campaign_id);
        let rows = self.get_all(credential, &path, &params).await?;
        Ok(rows.into_iter().map(RawInsightRow).collect())
    }

    async fn list_creatives(
        &self,
        credential: &Credential,
        _account_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<Creative>, AdsError> {
        let path = format!("{}/ads", campaign_id);
        let rows = self
            .get_all(credential, &path, &[("fields", FB_CREATIVE_FIELDS.to_string())])
            .await?;
        Ok(rows.iter().map(parse_creative).collect())
    }
}
