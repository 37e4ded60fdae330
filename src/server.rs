use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::aggregator::Aggregator;
use crate::chat::ChatUploader;
use crate::config::Config;
use crate::constants::PROVIDER_HEADER;
use crate::error::AdsError;
use crate::facebook::FacebookClient;
use crate::google_ads::GoogleAdsClient;
use crate::models::{AdAccount, Campaign, CampaignMetrics, Credential, Provider};
use crate::provider::ProviderClient;
use crate::window::{today_in, DateRange};

const MAX_ID_LEN: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub facebook: Arc<Aggregator>,
    pub google: Arc<Aggregator>,
    pub chat: Option<Arc<ChatUploader>>,
}

impl AppState {
    pub fn new(
        config: Config,
        facebook: Arc<dyn ProviderClient>,
        google: Arc<dyn ProviderClient>,
        chat: Option<ChatUploader>,
    ) -> Self {
        let aggregator = |client| {
            Arc::new(Aggregator::new(
                client,
                config.ad_group_cap,
                config.aggregation_timeout,
            ))
        };
        Self {
            facebook: aggregator(facebook),
            google: aggregator(google),
            chat: chat.map(Arc::new),
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: Config) -> Self {
        let facebook = FacebookClient::new(&config.facebook_base_url, config.request_timeout);
        let google = GoogleAdsClient::new(&config.google_ads_base_url, config.request_timeout);
        let chat = config
            .chat_service_url
            .as_deref()
            .map(|url| ChatUploader::new(url, config.request_timeout));
        Self::new(config, Arc::new(facebook), Arc::new(google), chat)
    }

    fn aggregator(&self, provider: Provider) -> &Aggregator {
        match provider {
            Provider::Facebook => &self.facebook,
            Provider::Google => &self.google,
        }
    }
}

/// The authenticated caller: which platform, and the credential to use on it.
#[derive(Debug)]
pub struct Session {
    pub provider: Provider,
    pub credential: Credential,
}

/// Reads `Authorization: Bearer <token>` and `X-Ad-Provider`.
pub fn session(headers: &HeaderMap, config: &Config) -> Result<Session, AdsError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AdsError::Unauthorized("missing bearer token".to_string()))?;

    let provider = headers
        .get(PROVIDER_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AdsError::Unauthorized("missing provider".to_string()))?
        .parse::<Provider>()
        .map_err(AdsError::Unauthorized)?;

    let credential = match provider {
        Provider::Facebook => Credential::new(token),
        Provider::Google => Credential {
            developer_token: config.google_developer_token.clone(),
            login_customer_id: config.google_login_customer_id.clone(),
            ..Credential::new(token)
        },
    };

    Ok(Session {
        provider,
        credential,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignsQuery {
    pub account_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuery {
    pub account_id: Option<String>,
    pub days: Option<u32>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

fn validate_id<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, AdsError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdsError::Validation(format!("{} is required", name)))?;
    if value.len() > MAX_ID_LEN
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AdsError::Validation(format!("{} is malformed", name)));
    }
    Ok(value)
}

/// Explicit `since`/`until` win; otherwise a trailing window of `days`.
pub fn resolve_window(query: &DetailQuery, config: &Config) -> Result<DateRange, AdsError> {
    match (query.since, query.until) {
        (Some(since), Some(until)) => DateRange::new(since, until),
        (None, None) => DateRange::trailing(
            query.days.unwrap_or(config.default_window_days),
            today_in(config.reporting_timezone),
        ),
        _ => Err(AdsError::Validation(
            "since and until must be given together".to_string(),
        )),
    }
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AdsError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AdsError::Validation(rejection.body_text()))
}

fn logged(err: AdsError) -> AdsError {
    if err.status_code().is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    err
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /adaccounts
async fn list_ad_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AdAccount>>, AdsError> {
    let session = session(&headers, &state.config).map_err(logged)?;
    let accounts = state
        .aggregator(session.provider)
        .list_ad_accounts(&session.credential)
        .await
        .map_err(logged)?;
    Ok(Json(accounts))
}

/// GET /campaigns?accountId=
async fn list_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<CampaignsQuery>, QueryRejection>,
) -> Result<Json<Vec<Campaign>>, AdsError> {
    let session = session(&headers, &state.config).map_err(logged)?;
    let query = query_params(query).map_err(logged)?;
    let account_id = validate_id("accountId", query.account_id.as_deref()).map_err(logged)?;

    let campaigns = state
        .aggregator(session.provider)
        .list_campaigns(&session.credential, account_id)
        .await
        .map_err(logged)?;
    Ok(Json(campaigns))
}

async fn campaign_metrics(
    state: &AppState,
    headers: &HeaderMap,
    campaign_id: &str,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<CampaignMetrics, AdsError> {
    let session = session(headers, &state.config)?;
    let query = query_params(query)?;
    let account_id = validate_id("accountId", query.account_id.as_deref())?;
    let campaign_id = validate_id("campaign id", Some(campaign_id))?;
    let range = resolve_window(&query, &state.config)?;

    state
        .aggregator(session.provider)
        .fetch_campaign_detail(&session.credential, account_id, campaign_id, range)
        .await
}

/// GET /campaigns/:id?accountId=&days=&since=&until=
async fn campaign_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(campaign_id): Path<String>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<Json<CampaignMetrics>, AdsError> {
    campaign_metrics(&state, &headers, &campaign_id, query)
        .await
        .map(Json)
        .map_err(logged)
}

/// POST /campaigns/:id/upload — aggregate, then hand the result to the chat service.
async fn upload_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(campaign_id): Path<String>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<Json<Value>, AdsError> {
    let chat = state
        .chat
        .clone()
        .ok_or_else(|| AdsError::MissingConfiguration("CHAT_SERVICE_URL is not configured".to_string()))
        .map_err(logged)?;

    let metrics = campaign_metrics(&state, &headers, &campaign_id, query)
        .await
        .map_err(logged)?;
    chat.upload_metrics(&metrics)
        .await
        .map_err(|e| logged(e.into()))?;

    Ok(Json(json!({ "uploaded": true, "campaignId": metrics.campaign_id })))
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/adaccounts", get(list_ad_accounts))
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(campaign_detail))
        .route("/campaigns/:id/upload", post(upload_campaign))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
