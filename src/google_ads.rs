use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::constants::{
    DEVELOPER_TOKEN_HEADER, GADS_METRIC_FIELDS, GOOGLE_ADS_API_VERSION, LOGIN_CUSTOMER_ID_HEADER,
};
use crate::error::AdsError;
use crate::http::{read_json, transport_error};
use crate::models::{AccountStatus, AdAccount, Campaign, Creative, Credential, Provider};
use crate::provider::{Breakdown, ProviderClient, RawInsightRow};
use crate::window::DateRange;

const PROVIDER: Provider = Provider::Google;

pub struct GoogleAdsClient {
    client: Client,
    timeout: Duration,
    base_url: String,
}

impl GoogleAdsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), GOOGLE_ADS_API_VERSION),
        }
    }

    fn authorize(&self, request: RequestBuilder, credential: &Credential) -> Result<RequestBuilder, AdsError> {
        let developer_token = developer_token(credential)?;
        let mut request = request
            .timeout(self.timeout)
            .bearer_auth(&credential.access_token)
            .header(DEVELOPER_TOKEN_HEADER, developer_token);
        if let Some(login) = credential.login_customer_id.as_deref() {
            request = request.header(LOGIN_CUSTOMER_ID_HEADER, customer_id(login)?);
        }
        Ok(request)
    }

    /// Run a GAQL query and flatten the streamed batches into rows.
    async fn search_stream(
        &self,
        credential: &Credential,
        customer: &str,
        query: &str,
    ) -> Result<Vec<Value>, AdsError> {
        let url = format!(
            "{}/{}/googleAds:searchStream",
            self.base_url,
            customer_resource(customer)?
        );
        let request = self
            .authorize(self.client.post(&url), credential)?
            .json(&json!({ "query": query }));

        debug!(customer, "Google Ads searchStream");
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let body = read_json(PROVIDER, response).await?;
        Ok(flatten_stream(body))
    }

    async fn fetch_account(&self, credential: &Credential, customer: &str) -> Result<AdAccount, AdsError> {
        let query = "SELECT customer.id, customer.descriptive_name, customer.currency_code, \
                     customer.time_zone, customer.status, customer.test_account FROM customer LIMIT 1";
        let rows = self.search_stream(credential, customer, query).await?;
        rows.first()
            .map(parse_account)
            .ok_or_else(|| AdsError::NotFound(format!("customer {}", customer)))
    }
}

pub fn developer_token(credential: &Credential) -> Result<&str, AdsError> {
    credential
        .developer_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AdsError::MissingConfiguration("Google Ads developer token is not configured".to_string())
        })
}

/// Accepts `123-456-7890`, `1234567890` or `customers/1234567890`.
pub fn customer_id(raw: &str) -> Result<String, AdsError> {
    let id: String = raw
        .trim()
        .trim_start_matches("customers/")
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AdsError::Validation(format!("invalid Google Ads customer id: {}", raw)));
    }
    Ok(id)
}

pub fn customer_resource(raw: &str) -> Result<String, AdsError> {
    Ok(format!("customers/{}", customer_id(raw)?))
}

/// Ids are interpolated into GAQL, so only digits are accepted.
fn numeric_id<'a>(raw: &'a str, what: &str) -> Result<&'a str, AdsError> {
    let id = raw.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AdsError::Validation(format!("invalid Google Ads {} id: {}", what, raw)));
    }
    Ok(id)
}

fn date_clause(range: &DateRange) -> String {
    format!(
        "segments.date BETWEEN '{}' AND '{}'",
        range.since.format("%Y-%m-%d"),
        range.until.format("%Y-%m-%d")
    )
}

/// GAQL for campaign insights. Demographic slices span two views.
pub fn insights_queries(campaign_id: &str, range: &DateRange, breakdown: Option<Breakdown>) -> Vec<String> {
    let filter = format!("WHERE campaign.id = {} AND {}", campaign_id, date_clause(range));
    let on_campaign = |segment: &str| {
        format!("SELECT {}, {} FROM campaign {}", segment, GADS_METRIC_FIELDS, filter)
    };

    match breakdown {
        None => vec![format!(
            "SELECT campaign.id, {}, metrics.search_impression_share FROM campaign {}",
            GADS_METRIC_FIELDS, filter
        )],
        Some(Breakdown::Daily) => vec![format!("{} ORDER BY segments.date", on_campaign("segments.date"))],
        Some(Breakdown::Platform) => vec![on_campaign("segments.ad_network_type")],
        Some(Breakdown::Device) => vec![on_campaign("segments.device")],
        Some(Breakdown::Placement) => vec![on_campaign("segments.slot")],
        Some(Breakdown::Country) => vec![format!(
            "SELECT geographic_view.country_criterion_id, {} FROM geographic_view {}",
            GADS_METRIC_FIELDS, filter
        )],
        Some(Breakdown::Demographic) => vec![
            format!(
                "SELECT ad_group_criterion.age_range.type, {} FROM age_range_view {}",
                GADS_METRIC_FIELDS, filter
            ),
            format!(
                "SELECT ad_group_criterion.gender.type, {} FROM gender_view {}",
                GADS_METRIC_FIELDS, filter
            ),
        ],
    }
}

/// `searchStream` answers with an array of batches, each carrying `results`.
pub fn flatten_stream(body: Value) -> Vec<Value> {
    let batches = match body {
        Value::Array(batches) => batches,
        other => vec![other],
    };
    batches
        .into_iter()
        .filter_map(|mut batch| match batch.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) => Some(results),
            _ => None,
        })
        .flatten()
        .collect()
}

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_at(value: &Value, pointer: &str) -> Option<NaiveDate> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_account(row: &Value) -> AdAccount {
    let status = if row.pointer("/customer/testAccount").and_then(Value::as_bool) == Some(true) {
        AccountStatus::Test
    } else if row.pointer("/customer/status").and_then(Value::as_str) == Some("ENABLED") {
        AccountStatus::Active
    } else {
        AccountStatus::Inactive
    };

    AdAccount {
        id: str_at(row, "/customer/id").unwrap_or_default(),
        name: str_at(row, "/customer/descriptiveName").unwrap_or_else(|| "Unknown".to_string()),
        status,
        currency_code: str_at(row, "/customer/currencyCode"),
        time_zone: str_at(row, "/customer/timeZone"),
    }
}

fn parse_campaign(row: &Value) -> Campaign {
    Campaign {
        id: str_at(row, "/campaign/id").unwrap_or_default(),
        name: str_at(row, "/campaign/name").unwrap_or_default(),
        status: str_at(row, "/campaign/status").unwrap_or_default(),
        objective: str_at(row, "/campaign/advertisingChannelType").unwrap_or_default(),
        start_date: date_at(row, "/campaign/startDate"),
        end_date: date_at(row, "/campaign/endDate"),
        bidding_strategy: str_at(row, "/campaign/biddingStrategyType"),
    }
}

fn parse_creative(row: &Value) -> Creative {
    let final_urls = row
        .pointer("/adGroupAd/ad/finalUrls")
        .and_then(Value::as_array)
        .map(|urls| urls.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Creative {
        ad_id: str_at(row, "/adGroupAd/ad/id").unwrap_or_default(),
        ad_name: str_at(row, "/adGroupAd/ad/name"),
        ad_type: str_at(row, "/adGroupAd/ad/type"),
        final_urls,
        ..Creative::default()
    }
}

#[async_trait]
impl ProviderClient for GoogleAdsClient {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn list_ad_accounts(&self, credential: &Credential) -> Result<Vec<AdAccount>, AdsError> {
        let url = format!("{}/customers:listAccessibleCustomers", self.base_url);
        let request = self.authorize(self.client.get(&url), credential)?;
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let body = read_json(PROVIDER, response).await?;

        let customers: Vec<String> = body
            .get("resourceNames")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let lookups = customers
            .iter()
            .map(|customer| self.fetch_account(credential, customer));
        let results = join_all(lookups).await;

        let mut accounts = Vec::with_capacity(results.len());
        for (customer, result) in customers.iter().zip(results) {
            match result {
                Ok(account) => accounts.push(account),
                Err(e) => warn!(customer = %customer, error = %e, "Skipping inaccessible customer"),
            }
        }
        Ok(accounts)
    }

    async fn list_campaigns(
        &self,
        credential: &Credential,
        account_id: &str,
    ) -> Result<Vec<Campaign>, AdsError> {
        let query = "SELECT campaign.id, campaign.name, campaign.status, \
                     campaign.advertising_channel_type, campaign.start_date, campaign.end_date, \
                     campaign.bidding_strategy_type FROM campaign \
                     WHERE campaign.status != 'REMOVED' ORDER BY campaign.name";
        let rows = self.search_stream(credential, account_id, query).await?;
        Ok(rows.iter().map(parse_campaign).collect())
    }

    async fn get_campaign_insights(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: &DateRange,
        breakdown: Option<Breakdown>,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        developer_token(credential)?;
        let campaign_id = numeric_id(campaign_id, "campaign")?;

        let queries = insights_queries(campaign_id, range, breakdown);
        let results = join_all(
            queries
                .iter()
                .map(|query| self.search_stream(credential, account_id, query)),
        )
        .await;

        let mut rows = Vec::new();
        for result in results {
            rows.extend(result?.into_iter().map(RawInsightRow));
        }
        Ok(rows)
    }

    async fn list_ad_groups(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        developer_token(credential)?;
        let campaign_id = numeric_id(campaign_id, "campaign")?;
        let query = format!(
            "SELECT ad_group.id, ad_group.name, ad_group.status, {} FROM ad_group \
             WHERE campaign.id = {} AND {} ORDER BY metrics.impressions DESC",
            GADS_METRIC_FIELDS,
            campaign_id,
            date_clause(range)
        );
        let rows = self.search_stream(credential, account_id, &query).await?;
        Ok(rows.into_iter().map(RawInsightRow).collect())
    }

    async fn list_creatives(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<Creative>, AdsError> {
        developer_token(credential)?;
        let campaign_id = numeric_id(campaign_id, "campaign")?;
        let query = format!(
            "SELECT ad_group_ad.ad.id, ad_group_ad.ad.name, ad_group_ad.ad.type, \
             ad_group_ad.ad.final_urls, ad_group_ad.status FROM ad_group_ad \
             WHERE campaign.id = {} AND ad_group_ad.status != 'REMOVED'",
            campaign_id
        );
        let rows = self.search_stream(credential, account_id, &query).await?;
        Ok(rows.iter().map(parse_creative).collect())
    }
}
