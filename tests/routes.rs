use std::sync::Arc;
use std::time::Duration;

use ad_metrics_service::config::Config;
use ad_metrics_service::error::AdsError;
use ad_metrics_service::google_ads::GoogleAdsClient;
use ad_metrics_service::models::{AccountStatus, AdAccount, Campaign, Creative, Credential, Provider};
use ad_metrics_service::provider::{Breakdown, ProviderClient, RawInsightRow};
use ad_metrics_service::server::{app_router, AppState};
use ad_metrics_service::window::DateRange;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Clone, Copy)]
enum Scenario {
    Healthy,
    NoRows,
    AdSetsDown,
    Throttled,
}

struct ScriptedFacebook {
    scenario: Scenario,
}

#[async_trait]
impl ProviderClient for ScriptedFacebook {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    async fn list_ad_accounts(&self, credential: &Credential) -> Result<Vec<AdAccount>, AdsError> {
        assert_eq!(credential.access_token, "EAAB");
        Ok(vec![AdAccount {
            id: "1029".to_string(),
            name: "Shop TH".to_string(),
            status: AccountStatus::Active,
            currency_code: Some("THB".to_string()),
            time_zone: None,
        }])
    }

    async fn list_campaigns(&self, _: &Credential, account_id: &str) -> Result<Vec<Campaign>, AdsError> {
        Ok(vec![Campaign {
            id: "42".to_string(),
            name: format!("Campaign of {}", account_id),
            status: "ACTIVE".to_string(),
            objective: "OUTCOME_SALES".to_string(),
            start_date: None,
            end_date: None,
            bidding_strategy: None,
        }])
    }

    async fn get_campaign_insights(
        &self,
        _: &Credential,
        _: &str,
        _: &str,
        _: &DateRange,
        breakdown: Option<Breakdown>,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        match (self.scenario, breakdown) {
            (Scenario::Throttled, None) => Err(AdsError::RateLimited {
                provider: Provider::Facebook,
                retry_after: Some(60),
            }),
            (Scenario::NoRows, _) => Ok(Vec::new()),
            (_, None) => Ok(vec![RawInsightRow(json!({
                "clicks": "120",
                "impressions": "15000",
                "spend": "45.30"
            }))]),
            (_, Some(Breakdown::Platform)) => Ok(vec![RawInsightRow(json!({
                "publisher_platform": "facebook",
                "clicks": "100",
                "impressions": "12000",
                "spend": "40.00"
            }))]),
            (_, Some(_)) => Ok(Vec::new()),
        }
    }

    async fn list_ad_groups(
        &self,
        _: &Credential,
        _: &str,
        _: &str,
        _: &DateRange,
    ) -> Result<Vec<RawInsightRow>, AdsError> {
        match self.scenario {
            Scenario::AdSetsDown => Err(AdsError::Transport {
                provider: Provider::Facebook,
                message: "request timed out".to_string(),
            }),
            _ => Ok(vec![RawInsightRow(json!({
                "adset_id": "77",
                "adset_name": "Lookalike",
                "impressions": "15000"
            }))]),
        }
    }

    async fn list_creatives(&self, _: &Credential, _: &str, _: &str) -> Result<Vec<Creative>, AdsError> {
        Ok(Vec::new())
    }
}

fn router(scenario: Scenario) -> Router {
    let google = GoogleAdsClient::new("http://127.0.0.1:9", Duration::from_millis(200));
    let state = AppState::new(
        Config::default(),
        Arc::new(ScriptedFacebook { scenario }),
        Arc::new(google),
        None,
    );
    app_router(state)
}

fn request(method: Method, uri: &str, provider: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(provider) = provider {
        builder = builder
            .header("authorization", "Bearer EAAB")
            .header("x-ad-provider", provider);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json, retry_after)
}

#[tokio::test]
async fn health_is_public() {
    let (status, body, _) = send(router(Scenario::Healthy), request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_session_is_unauthorized() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/adaccounts", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().starts_with("Unauthorized"));
}

#[tokio::test]
async fn lists_accounts_and_campaigns() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/adaccounts", Some("facebook")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "1029");
    assert_eq!(body[0]["status"], "ACTIVE");
    assert_eq!(body[0]["currencyCode"], "THB");

    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/campaigns?accountId=1029", Some("facebook")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Campaign of 1029");
}

#[tokio::test]
async fn missing_account_id_is_bad_request() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/campaigns", Some("facebook")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request: accountId is required");
}

#[tokio::test]
async fn malformed_days_is_bad_request() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/campaigns/42?accountId=1029&days=lots", Some("facebook")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn campaign_detail_is_unified() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(
            Method::GET,
            "/campaigns/42?accountId=1029&since=2024-03-01&until=2024-03-07",
            Some("facebook"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sourceProvider"], "FACEBOOK");
    assert_eq!(body["clicks"], 120);
    assert!((body["ctr"].as_f64().unwrap() - 0.8).abs() < 1e-9);
    assert!((body["cpm"].as_f64().unwrap() - 3.02).abs() < 1e-9);
    assert_eq!(body["window"]["since"], "2024-03-01");
    assert_eq!(body["dailyInsights"].as_array().unwrap().len(), 7);
    assert_eq!(body["platformBreakdown"][0]["platform"], "facebook");
    assert_eq!(body["adGroupOrAdSet"][0]["name"], "Lookalike");
    assert!(body.get("degraded").is_none());
}

#[tokio::test]
async fn failed_ad_sets_do_not_fail_the_request() {
    let (status, body, _) = send(
        router(Scenario::AdSetsDown),
        request(Method::GET, "/campaigns/42?accountId=1029&days=7", Some("facebook")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["impressions"], 15000);
    assert_eq!(body["adGroupOrAdSet"], json!([]));
    assert_eq!(body["degraded"], json!(["adGroupOrAdSet"]));
}

#[tokio::test]
async fn empty_window_is_not_found_with_bounds() {
    let (status, body, _) = send(
        router(Scenario::NoRows),
        request(
            Method::GET,
            "/campaigns/42?accountId=1029&since=2024-01-01&until=2024-01-31",
            Some("facebook"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"]["since"], "2024-01-01");
    assert_eq!(body["details"]["until"], "2024-01-31");
}

#[tokio::test]
async fn throttling_surfaces_retry_after() {
    let (status, body, retry_after) = send(
        router(Scenario::Throttled),
        request(Method::GET, "/campaigns/42?accountId=1029", Some("facebook")),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(retry_after.as_deref(), Some("60"));
    assert_eq!(body["details"]["retryAfter"], 60);
}

#[tokio::test]
async fn google_without_developer_token_is_a_configuration_error() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::GET, "/campaigns/555?accountId=123-456-7890&days=7", Some("google")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("developer token"));
}

#[tokio::test]
async fn upload_without_chat_service_is_a_configuration_error() {
    let (status, body, _) = send(
        router(Scenario::Healthy),
        request(Method::POST, "/campaigns/42/upload?accountId=1029", Some("facebook")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("CHAT_SERVICE_URL"));
}
