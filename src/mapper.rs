use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::constants::{FB_CONVERSION_ACTION_TYPES, MICROS_PER_UNIT};
use crate::models::{InsightRow, MetricSet, Provider};
use crate::provider::RawInsightRow;

/// Facebook field → unified dimension name.
const FB_DIMENSIONS: &[(&str, &str)] = &[
    ("publisher_platform", "platform"),
    ("age", "age"),
    ("gender", "gender"),
    ("country", "country"),
    ("device_platform", "device"),
    ("platform_position", "placement"),
    ("adset_id", "id"),
    ("adset_name", "name"),
];

/// Google Ads JSON pointer → unified dimension name.
const GADS_DIMENSIONS: &[(&str, &str)] = &[
    ("/segments/adNetworkType", "platform"),
    ("/adGroupCriterion/ageRange/type", "age"),
    ("/adGroupCriterion/gender/type", "gender"),
    ("/geographicView/countryCriterionId", "country"),
    ("/segments/device", "device"),
    ("/segments/slot", "placement"),
    ("/adGroup/id", "id"),
    ("/adGroup/name", "name"),
    ("/adGroup/status", "status"),
];

/// Rates the vendor reported itself; anything absent is derived.
#[derive(Debug, Default)]
struct Supplied {
    cpc: Option<Decimal>,
    cpm: Option<Decimal>,
    ctr: Option<Decimal>,
    cost_per_conversion: Option<Decimal>,
    frequency: Option<f64>,
}

pub fn normalize(row: &RawInsightRow, provider: Provider) -> InsightRow {
    match provider {
        Provider::Facebook => normalize_facebook(&row.0),
        Provider::Google => normalize_google(&row.0),
    }
}

/// Google money fields are integer micros, averages can carry a fraction.
pub fn from_micros(micros: Decimal) -> Decimal {
    micros / Decimal::from(MICROS_PER_UNIT)
}

pub fn to_micros(amount: Decimal) -> Decimal {
    amount * Decimal::from(MICROS_PER_UNIT)
}

pub fn fraction_to_percent(fraction: Decimal) -> Decimal {
    fraction * Decimal::ONE_HUNDRED
}

/// `numerator * scale / denominator` to 2 places; zero when the denominator is zero.
pub fn ratio(numerator: Decimal, denominator: Decimal, scale: i64) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator
        .checked_mul(Decimal::from(scale))
        .and_then(|scaled| scaled.checked_div(denominator))
        .map(|value| value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

/// Sum counters across rows and re-derive every rate from the sums.
///
/// Impression share is averaged over the rows that report it, weighted by
/// their impressions.
pub fn sum_metrics(rows: &[MetricSet]) -> MetricSet {
    if let [single] = rows {
        return single.clone();
    }

    let mut total = MetricSet::default();
    for row in rows {
        total.clicks += row.clicks;
        total.impressions += row.impressions;
        total.reach += row.reach;
        total.spend += row.spend;
        total.conversions += row.conversions;
        total.conversion_value += row.conversion_value;
    }
    let impression_share = weighted_share(rows);
    MetricSet {
        impression_share,
        ..finish(total, Supplied::default())
    }
}

fn weighted_share(rows: &[MetricSet]) -> Option<Decimal> {
    let shares: Vec<(Decimal, Decimal)> = rows
        .iter()
        .filter_map(|row| row.impression_share.map(|share| (share, Decimal::from(row.impressions))))
        .collect();
    if shares.is_empty() {
        return None;
    }

    let weight: Decimal = shares.iter().map(|(_, impressions)| *impressions).sum();
    let share = if weight.is_zero() {
        shares.iter().map(|(share, _)| *share).sum::<Decimal>() / Decimal::from(shares.len())
    } else {
        shares.iter().map(|(share, impressions)| share * impressions).sum::<Decimal>() / weight
    };
    Some(share.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn finish(mut metrics: MetricSet, supplied: Supplied) -> MetricSet {
    let clicks = Decimal::from(metrics.clicks);
    let impressions = Decimal::from(metrics.impressions);

    // A vendor rate over a zero denominator is ignored.
    metrics.cpc = match supplied.cpc {
        Some(cpc) if metrics.clicks > 0 => cpc,
        _ => ratio(metrics.spend, clicks, 1),
    };
    metrics.cpm = match supplied.cpm {
        Some(cpm) if metrics.impressions > 0 => cpm,
        _ => ratio(metrics.spend, impressions, 1000),
    };
    metrics.ctr = match supplied.ctr {
        Some(ctr) if metrics.impressions > 0 => ctr,
        _ => ratio(clicks, impressions, 100),
    };
    metrics.cost_per_conversion = match supplied.cost_per_conversion {
        Some(cost) if !metrics.conversions.is_zero() => cost,
        _ => ratio(metrics.spend, metrics.conversions, 1),
    };
    metrics.roas = ratio(metrics.conversion_value, metrics.spend, 1);
    metrics.frequency = match supplied.frequency {
        Some(frequency) if metrics.reach > 0 && frequency.is_finite() => frequency,
        _ if metrics.reach > 0 => metrics.impressions as f64 / metrics.reach as f64,
        _ => 0.0,
    };
    metrics
}

fn normalize_facebook(row: &Value) -> InsightRow {
    let metrics = MetricSet {
        clicks: count_at(row, "/clicks"),
        impressions: count_at(row, "/impressions"),
        reach: count_at(row, "/reach"),
        spend: decimal_at(row, "/spend").unwrap_or_default(),
        conversions: action_value(row, "actions").unwrap_or_default(),
        conversion_value: action_value(row, "action_values").unwrap_or_default(),
        ..MetricSet::default()
    };

    let supplied = Supplied {
        cpc: decimal_at(row, "/cpc"),
        cpm: decimal_at(row, "/cpm"),
        ctr: decimal_at(row, "/ctr"),
        cost_per_conversion: action_value(row, "cost_per_action_type"),
        frequency: decimal_at(row, "/frequency").and_then(|f| f.to_f64()),
    };

    // Only rows covering a single day are dated.
    let start = date_at(row, "/date_start");
    let date = start.filter(|start| date_at(row, "/date_stop").map_or(true, |stop| stop == *start));

    let mut dimensions = BTreeMap::new();
    for (field, name) in FB_DIMENSIONS {
        if let Some(value) = row.get(*field).and_then(label) {
            dimensions.insert((*name).to_string(), value);
        }
    }

    InsightRow {
        date,
        dimensions,
        metrics: finish(metrics, supplied),
    }
}

fn normalize_google(row: &Value) -> InsightRow {
    let micros = |pointer: &str| decimal_at(row, pointer).map(from_micros);

    let metrics = MetricSet {
        clicks: count_at(row, "/metrics/clicks"),
        impressions: count_at(row, "/metrics/impressions"),
        spend: micros("/metrics/costMicros").unwrap_or_default(),
        conversions: decimal_at(row, "/metrics/conversions").unwrap_or_default(),
        conversion_value: decimal_at(row, "/metrics/conversionsValue").unwrap_or_default(),
        impression_share: decimal_at(row, "/metrics/searchImpressionShare")
            .map(fraction_to_percent),
        ..MetricSet::default()
    };

    let supplied = Supplied {
        cpc: micros("/metrics/averageCpc"),
        cpm: micros("/metrics/averageCpm"),
        ctr: decimal_at(row, "/metrics/ctr").map(fraction_to_percent),
        cost_per_conversion: micros("/metrics/costPerConversion"),
        frequency: None,
    };

    let mut dimensions = BTreeMap::new();
    for (pointer, name) in GADS_DIMENSIONS {
        if let Some(value) = row.pointer(pointer).and_then(label) {
            dimensions.insert((*name).to_string(), value);
        }
    }

    InsightRow {
        date: date_at(row, "/segments/date"),
        dimensions,
        metrics: finish(metrics, supplied),
    }
}

fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn decimal_at(row: &Value, pointer: &str) -> Option<Decimal> {
    row.pointer(pointer).and_then(decimal_from)
}

fn count_at(row: &Value, pointer: &str) -> u64 {
    decimal_at(row, pointer)
        .filter(|value| value.is_sign_positive())
        .and_then(|value| value.trunc().to_u64())
        .unwrap_or(0)
}

fn date_at(row: &Value, pointer: &str) -> Option<NaiveDate> {
    row.pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

/// Value of the highest-priority conversion action present in a Facebook action list.
fn action_value(row: &Value, field: &str) -> Option<Decimal> {
    let actions = row.get(field)?.as_array()?;
    FB_CONVERSION_ACTION_TYPES.iter().find_map(|wanted| {
        actions
            .iter()
            .find(|action| action.get("action_type").and_then(Value::as_str) == Some(*wanted))
            .and_then(|action| action.get("value"))
            .and_then(decimal_from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn facebook(value: Value) -> InsightRow {
        normalize(&RawInsightRow(value), Provider::Facebook)
    }

    fn google(value: Value) -> InsightRow {
        normalize(&RawInsightRow(value), Provider::Google)
    }

    #[test]
    fn test_zero_impressions_yield_zero_rates() {
        let row = facebook(json!({ "clicks": "0", "impressions": "0", "spend": "12.50" }));
        assert_eq!(row.metrics.ctr, Decimal::ZERO);
        assert_eq!(row.metrics.cpm, Decimal::ZERO);
        assert_eq!(row.metrics.cpc, Decimal::ZERO);

        let row = google(json!({ "metrics": { "impressions": "0", "ctr": 0.5, "costMicros": "1000000" } }));
        assert_eq!(row.metrics.ctr, Decimal::ZERO);
        assert_eq!(row.metrics.cpm, Decimal::ZERO);
    }

    #[test]
    fn test_facebook_derived_rates() {
        let row = facebook(json!({
            "clicks": "120",
            "impressions": "15000",
            "spend": "45.30",
            "date_start": "2024-03-01",
            "date_stop": "2024-03-30"
        }));

        assert_eq!(row.metrics.clicks, 120);
        assert_eq!(row.metrics.impressions, 15000);
        assert_eq!(row.metrics.spend, dec!(45.30));
        assert_eq!(row.metrics.ctr, dec!(0.8));
        assert_eq!(row.metrics.cpm, dec!(3.02));
        assert_eq!(row.metrics.cpc, dec!(0.38));
        assert_eq!(row.date, None);
    }

    #[test]
    fn test_facebook_supplied_rates_are_kept() {
        let row = facebook(json!({
            "clicks": "10",
            "impressions": "1000",
            "reach": "800",
            "frequency": "1.25",
            "spend": "5.00",
            "ctr": "1.0",
            "cpm": "5.000001",
            "date_start": "2024-03-02",
            "date_stop": "2024-03-02"
        }));

        assert_eq!(row.metrics.ctr, dec!(1.0));
        assert_eq!(row.metrics.cpm, dec!(5.000001));
        assert_eq!(row.metrics.cpc, dec!(0.50));
        assert_eq!(row.metrics.frequency, 1.25);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn test_facebook_conversions_use_first_priority_action() {
        let row = facebook(json!({
            "clicks": "50",
            "impressions": "5000",
            "spend": "100",
            "actions": [
                { "action_type": "link_click", "value": "50" },
                { "action_type": "lead", "value": "3" },
                { "action_type": "offsite_conversion.fb_pixel_purchase", "value": "4" }
            ],
            "action_values": [
                { "action_type": "offsite_conversion.fb_pixel_purchase", "value": "250.00" }
            ]
        }));

        assert_eq!(row.metrics.conversions, dec!(4));
        assert_eq!(row.metrics.conversion_value, dec!(250.00));
        assert_eq!(row.metrics.cost_per_conversion, dec!(25));
        assert_eq!(row.metrics.roas, dec!(2.5));
    }

    #[test]
    fn test_facebook_dimensions_are_renamed() {
        let row = facebook(json!({
            "impressions": "10",
            "publisher_platform": "instagram",
            "platform_position": "feed",
            "adset_id": "2385",
            "adset_name": "Retargeting"
        }));

        assert_eq!(row.dimensions.get("platform").map(String::as_str), Some("instagram"));
        assert_eq!(row.dimensions.get("placement").map(String::as_str), Some("feed"));
        assert_eq!(row.dimensions.get("id").map(String::as_str), Some("2385"));
        assert_eq!(row.dimensions.get("name").map(String::as_str), Some("Retargeting"));
        assert!(!row.dimensions.contains_key("publisher_platform"));
    }

    #[test]
    fn test_google_cost_micros() {
        let row = google(json!({ "metrics": { "costMicros": "2500000" } }));
        assert_eq!(row.metrics.spend, dec!(2.50));
    }

    #[test]
    fn test_micros_round_trip() {
        for micros in [dec!(0), dec!(1), dec!(999999), dec!(2500000), dec!(123456789012), dec!(300000.5)] {
            assert_eq!(to_micros(from_micros(micros)), micros);
        }
        assert_eq!(from_micros(dec!(1)), dec!(0.000001));
    }

    #[test]
    fn test_google_spend_converts_back_to_reported_micros() {
        let row = google(json!({ "metrics": { "clicks": "10", "costMicros": "123456789012", "averageCpc": 412345.5 } }));
        assert_eq!(row.metrics.spend, dec!(123456.789012));
        assert_eq!(to_micros(row.metrics.spend), dec!(123456789012));
        assert_eq!(to_micros(row.metrics.cpc), dec!(412345.5));
    }

    #[test]
    fn test_google_fractions_become_percentages() {
        let row = google(json!({
            "metrics": {
                "clicks": "30",
                "impressions": "1500",
                "costMicros": "9000000",
                "ctr": 0.02,
                "averageCpc": "300000",
                "averageCpm": "6000000",
                "conversions": 1.5,
                "conversionsValue": 27.0,
                "searchImpressionShare": 0.4512
            },
            "segments": { "date": "2024-05-04", "device": "MOBILE" }
        }));

        assert_eq!(row.metrics.ctr, dec!(2));
        assert_eq!(row.metrics.cpc, dec!(0.3));
        assert_eq!(row.metrics.cpm, dec!(6));
        assert_eq!(row.metrics.impression_share, Some(dec!(45.12)));
        assert_eq!(row.metrics.cost_per_conversion, dec!(6));
        assert_eq!(row.metrics.roas, dec!(3));
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 5, 4));
        assert_eq!(row.dimensions.get("device").map(String::as_str), Some("MOBILE"));
    }

    #[test]
    fn test_google_numeric_dimension_becomes_label() {
        let row = google(json!({
            "geographicView": { "countryCriterionId": "2840" },
            "metrics": { "impressions": "7" }
        }));
        assert_eq!(row.dimensions.get("country").map(String::as_str), Some("2840"));

        let row = google(json!({ "adGroup": { "id": 77, "name": "Brand" } }));
        assert_eq!(row.dimensions.get("id").map(String::as_str), Some("77"));
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let row = facebook(json!({}));
        assert_eq!(row.metrics, finish(MetricSet::default(), Supplied::default()));
        assert_eq!(row.metrics.spend, Decimal::ZERO);
        assert_eq!(row.metrics.frequency, 0.0);

        let row = google(json!({ "metrics": { "clicks": null, "costMicros": "garbage" } }));
        assert_eq!(row.metrics.clicks, 0);
        assert_eq!(row.metrics.spend, Decimal::ZERO);
    }

    #[test]
    fn test_sum_metrics_rederives_rates() {
        let a = facebook(json!({ "clicks": "10", "impressions": "1000", "spend": "10", "reach": "500" }));
        let b = facebook(json!({ "clicks": "30", "impressions": "3000", "spend": "30", "reach": "1500" }));

        let total = sum_metrics(&[a.metrics, b.metrics]);
        assert_eq!(total.clicks, 40);
        assert_eq!(total.impressions, 4000);
        assert_eq!(total.spend, dec!(40));
        assert_eq!(total.ctr, dec!(1));
        assert_eq!(total.cpm, dec!(10));
        assert_eq!(total.frequency, 2.0);
        assert_eq!(total.impression_share, None);
    }

    #[test]
    fn test_sum_metrics_weights_impression_share() {
        let day = |impressions: u64, share: f64| {
            google(json!({
                "metrics": { "impressions": impressions.to_string(), "searchImpressionShare": share },
                "segments": { "date": "2024-05-04" }
            }))
            .metrics
        };
        let unreported = google(json!({ "metrics": { "impressions": "500" } })).metrics;

        let total = sum_metrics(&[day(100, 0.5), day(300, 0.1), unreported]);
        assert_eq!(total.impressions, 900);
        assert_eq!(total.impression_share, Some(dec!(20)));

        let total = sum_metrics(&[day(0, 0.4), day(0, 0.2)]);
        assert_eq!(total.impression_share, Some(dec!(30)));
    }
}
