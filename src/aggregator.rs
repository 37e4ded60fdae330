use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::AdsError;
use crate::mapper::{normalize, sum_metrics};
use crate::models::{
    AdAccount, AdGroupSummary, BreakdownRow, Campaign, CampaignMetrics, Credential, DailyInsight,
    InsightRow, MetricSet, Provider,
};
use crate::provider::{Breakdown, ProviderClient, RawInsightRow};
use crate::window::DateRange;

pub struct Aggregator {
    client: Arc<dyn ProviderClient>,
    ad_group_cap: usize,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(client: Arc<dyn ProviderClient>, ad_group_cap: usize, timeout: Duration) -> Self {
        Self {
            client,
            ad_group_cap,
            timeout,
        }
    }

    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    pub async fn list_ad_accounts(&self, credential: &Credential) -> Result<Vec<AdAccount>, AdsError> {
        self.client.list_ad_accounts(credential).await
    }

    pub async fn list_campaigns(
        &self,
        credential: &Credential,
        account_id: &str,
    ) -> Result<Vec<Campaign>, AdsError> {
        self.client.list_campaigns(credential, account_id).await
    }

    /// Build the full campaign view, bounded by the aggregation timeout.
    ///
    /// Dropping the returned future cancels every in-flight vendor request.
    pub async fn fetch_campaign_detail(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: DateRange,
    ) -> Result<CampaignMetrics, AdsError> {
        let provider = self.provider();
        match tokio::time::timeout(
            self.timeout,
            self.gather(credential, account_id, campaign_id, range),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AdsError::Transport {
                provider,
                message: format!("aggregation exceeded {}s", self.timeout.as_secs()),
            }),
        }
    }

    async fn gather(
        &self,
        credential: &Credential,
        account_id: &str,
        campaign_id: &str,
        range: DateRange,
    ) -> Result<CampaignMetrics, AdsError> {
        let provider = self.provider();
        let client = self.client.as_ref();
        let range_ref = &range;
        let insights = |breakdown: Option<Breakdown>| {
            client.get_campaign_insights(credential, account_id, campaign_id, range_ref, breakdown)
        };

        let (summary, daily, platform, demographic, country, device, placement, ad_groups, creatives) = tokio::join!(
            insights(None),
            insights(Some(Breakdown::Daily)),
            insights(Some(Breakdown::Platform)),
            insights(Some(Breakdown::Demographic)),
            insights(Some(Breakdown::Country)),
            insights(Some(Breakdown::Device)),
            insights(Some(Breakdown::Placement)),
            client.list_ad_groups(credential, account_id, campaign_id, range_ref),
            client.list_creatives(credential, account_id, campaign_id),
        );

        let summary = summary?;
        if summary.is_empty() {
            return Err(AdsError::NoData {
                since: range.since,
                until: range.until,
            });
        }
        let totals = sum_metrics(
            &summary
                .iter()
                .map(|row| normalize(row, provider).metrics)
                .collect::<Vec<_>>(),
        );

        let mut degraded = Vec::new();
        let mut section = |name: &str, result: Result<Vec<RawInsightRow>, AdsError>| -> Vec<InsightRow> {
            match result {
                Ok(rows) => rows.iter().map(|row| normalize(row, provider)).collect(),
                Err(e) => {
                    warn!(%provider, campaign_id, section = name, error = %e, "Section degraded to empty");
                    degraded.push(name.to_string());
                    Vec::new()
                }
            }
        };

        // Only a fetched series is gap-filled; a failed one stays empty.
        let daily_fetched = daily.is_ok();
        let daily_rows = section(Breakdown::Daily.section(), daily);
        let daily_insights = if daily_fetched {
            daily_series(daily_rows, &range)
        } else {
            Vec::new()
        };
        let platform_breakdown = breakdown_rows(section(Breakdown::Platform.section(), platform));
        let demographic_breakdown =
            breakdown_rows(section(Breakdown::Demographic.section(), demographic));
        let country_breakdown = breakdown_rows(section(Breakdown::Country.section(), country));
        let device_breakdown = breakdown_rows(section(Breakdown::Device.section(), device));
        let placement_breakdown = breakdown_rows(section(Breakdown::Placement.section(), placement));
        let ad_group_or_ad_set = top_ad_groups(section("adGroupOrAdSet", ad_groups), self.ad_group_cap);

        let creatives = match creatives {
            Ok(creatives) => creatives,
            Err(e) => {
                warn!(%provider, campaign_id, section = "creatives", error = %e, "Section degraded to empty");
                degraded.push("creatives".to_string());
                Vec::new()
            }
        };

        info!(
            %provider,
            campaign_id,
            since = %range.since,
            until = %range.until,
            degraded = degraded.len(),
            "Campaign detail aggregated"
        );

        Ok(CampaignMetrics {
            source_provider: provider,
            account_id: account_id.to_string(),
            campaign_id: campaign_id.to_string(),
            window: range,
            totals,
            daily_insights,
            platform_breakdown,
            demographic_breakdown,
            country_breakdown,
            device_breakdown,
            placement_breakdown,
            ad_group_or_ad_set,
            creatives,
            degraded,
        })
    }
}

/// One row per window date, ascending. Missing dates are zero rows,
/// duplicate dates are summed and undated or out-of-window rows dropped.
pub fn daily_series(rows: Vec<InsightRow>, range: &DateRange) -> Vec<DailyInsight> {
    let mut by_date: BTreeMap<NaiveDate, Vec<MetricSet>> = BTreeMap::new();
    for row in rows {
        if let Some(date) = row.date.filter(|date| range.contains(*date)) {
            by_date.entry(date).or_default().push(row.metrics);
        }
    }

    range
        .dates()
        .map(|date| DailyInsight {
            date,
            metrics: by_date
                .get(&date)
                .map(|metrics| sum_metrics(metrics))
                .unwrap_or_default(),
        })
        .collect()
}

fn breakdown_rows(rows: Vec<InsightRow>) -> Vec<BreakdownRow> {
    rows.into_iter()
        .map(|row| BreakdownRow {
            dimensions: row.dimensions,
            metrics: row.metrics,
        })
        .collect()
}

/// Highest-impression ad groups first, truncated to `cap`.
pub fn top_ad_groups(rows: Vec<InsightRow>, cap: usize) -> Vec<AdGroupSummary> {
    let mut groups: Vec<AdGroupSummary> = rows
        .into_iter()
        .map(|mut row| AdGroupSummary {
            id: row.dimensions.remove("id").unwrap_or_default(),
            name: row.dimensions.remove("name").unwrap_or_default(),
            status: row.dimensions.remove("status"),
            metrics: row.metrics,
        })
        .collect();

    groups.sort_by(|a, b| b.metrics.impressions.cmp(&a.metrics.impressions));
    groups.truncate(cap);
    groups
}
