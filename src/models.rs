use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::window::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Facebook,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Facebook => "FACEBOOK",
            Provider::Google => "GOOGLE",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Provider::Facebook),
            "google" => Ok(Provider::Google),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Caller credential, passed explicitly into every provider call.
#[derive(Clone, Default)]
pub struct Credential {
    pub access_token: String,
    pub developer_token: Option<String>,
    pub login_customer_id: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }
}

// Keeps tokens out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("developer_token", &self.developer_token.as_ref().map(|_| "<redacted>"))
            .field("login_customer_id", &self.login_customer_id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdAccount {
    pub id: String,
    pub name: String,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: String,
    pub objective: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidding_strategy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub ad_id: String,
    pub ad_name: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub call_to_action: Option<String>,
    pub ad_type: Option<String>,
    #[serde(default)]
    pub final_urls: Vec<String>,
}

/// Provider-agnostic metric record. Money is account currency, rates are percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSet {
    pub clicks: u64,
    pub impressions: u64,
    pub spend: Decimal,
    pub reach: u64,
    pub frequency: f64,
    pub cpc: Decimal,
    pub cpm: Decimal,
    pub ctr: Decimal,
    pub conversions: Decimal,
    pub conversion_value: Decimal,
    pub cost_per_conversion: Decimal,
    pub roas: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impression_share: Option<Decimal>,
}

/// One normalized vendor row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightRow {
    pub date: Option<NaiveDate>,
    pub dimensions: BTreeMap<String, String>,
    pub metrics: MetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyInsight {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    #[serde(flatten)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdGroupSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

/// Aggregated campaign view returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub source_provider: Provider,
    pub account_id: String,
    pub campaign_id: String,
    pub window: DateRange,
    #[serde(flatten)]
    pub totals: MetricSet,
    pub daily_insights: Vec<DailyInsight>,
    pub platform_breakdown: Vec<BreakdownRow>,
    pub demographic_breakdown: Vec<BreakdownRow>,
    pub country_breakdown: Vec<BreakdownRow>,
    pub device_breakdown: Vec<BreakdownRow>,
    pub placement_breakdown: Vec<BreakdownRow>,
    pub ad_group_or_ad_set: Vec<AdGroupSummary>,
    pub creatives: Vec<Creative>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}
