use async_trait::async_trait;
use serde_json::Value;

use crate::error::AdsError;
use crate::models::{AdAccount, Campaign, Creative, Credential, Provider};
use crate::window::DateRange;

/// Dimension used to slice campaign insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Breakdown {
    Daily,
    Platform,
    Demographic,
    Country,
    Device,
    Placement,
}

impl Breakdown {
    pub fn section(&self) -> &'static str {
        match self {
            Breakdown::Daily => "dailyInsights",
            Breakdown::Platform => "platformBreakdown",
            Breakdown::Demographic => "demographicBreakdown",
            Breakdown::Country => "countryBreakdown",
            Breakdown::Device => "deviceBreakdown",
            Breakdown::Placement => "placementBreakdown",
        }
    }
}

/// A vendor row exactly as returned, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInsightRow(pub Value);

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn list_ad_accounts(&self, credential: &Credential) -> Result<Vec<AdAccount>, AdsError>;

    async fn list_campaigns(
        &self,
        credential: &Credential,
        account_id: &str,
    ) -> Result<Vec<Campaign>, AdsError>;

    /// Insight rows for one campaign. `None` asks for the campaign total over the window.
    async fn get_campaign_insights(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: &DateRange,
        breakdown: Option<Breakdown>,
    ) -> Result<Vec<RawInsightRow>, AdsError>;

    /// Per ad set (Facebook) or ad group (Google) insight rows.
    async fn list_ad_groups(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<RawInsightRow>, AdsError>;

    async fn list_creatives(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<Creative>, AdsError>;
}
