use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use dotenv::dotenv;
use thiserror::Error;
use url::Url;

use crate::constants::{
    DEFAULT_AD_GROUP_CAP, DEFAULT_AGGREGATION_TIMEOUT_SECS, DEFAULT_BIND_ADDRESS,
    DEFAULT_REPORTING_TIMEZONE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WINDOW_DAYS,
    FACEBOOK_BASE_URL, GOOGLE_ADS_BASE_URL, MAX_WINDOW_DAYS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub facebook_base_url: String,
    pub google_ads_base_url: String,
    pub google_developer_token: Option<String>,
    pub google_login_customer_id: Option<String>,
    pub chat_service_url: Option<String>,
    pub default_window_days: u32,
    pub ad_group_cap: usize,
    pub request_timeout: Duration,
    pub aggregation_timeout: Duration,
    pub reporting_timezone: Tz,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(String, String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            facebook_base_url: FACEBOOK_BASE_URL.to_string(),
            google_ads_base_url: GOOGLE_ADS_BASE_URL.to_string(),
            google_developer_token: None,
            google_login_customer_id: None,
            chat_service_url: None,
            default_window_days: DEFAULT_WINDOW_DAYS,
            ad_group_cap: DEFAULT_AD_GROUP_CAP,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            aggregation_timeout: Duration::from_secs(DEFAULT_AGGREGATION_TIMEOUT_SECS),
            reporting_timezone: Tz::UTC,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let default_window_days = parse_or(&get, "DEFAULT_WINDOW_DAYS", defaults.default_window_days)?;
        if default_window_days == 0 || default_window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_WINDOW_DAYS".to_string(),
                format!("must be between 1 and {}", MAX_WINDOW_DAYS),
            ));
        }

        let log_format = get("LOG_FORMAT").unwrap_or(defaults.log_format);
        if log_format != "text" && log_format != "json" {
            return Err(ConfigError::InvalidValue(
                "LOG_FORMAT".to_string(),
                "expected text or json".to_string(),
            ));
        }

        let tz_name = get("REPORTING_TIMEZONE").unwrap_or_else(|| DEFAULT_REPORTING_TIMEZONE.to_string());
        let reporting_timezone = Tz::from_str(&tz_name)
            .map_err(|_| ConfigError::InvalidValue("REPORTING_TIMEZONE".to_string(), tz_name.clone()))?;

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            facebook_base_url: url_or(&get, "FACEBOOK_BASE_URL", defaults.facebook_base_url)?,
            google_ads_base_url: url_or(&get, "GOOGLE_ADS_BASE_URL", defaults.google_ads_base_url)?,
            google_developer_token: get("GOOGLE_ADS_DEVELOPER_TOKEN"),
            google_login_customer_id: get("GOOGLE_ADS_LOGIN_CUSTOMER_ID"),
            chat_service_url: get("CHAT_SERVICE_URL")
                .map(|url| validate_url("CHAT_SERVICE_URL", url))
                .transpose()?,
            default_window_days,
            ad_group_cap: parse_or(&get, "AD_GROUP_CAP", defaults.ad_group_cap)?,
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            aggregation_timeout: Duration::from_secs(parse_or(
                &get,
                "AGGREGATION_TIMEOUT_SECS",
                DEFAULT_AGGREGATION_TIMEOUT_SECS,
            )?),
            reporting_timezone,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
        None => Ok(default),
    }
}

fn url_or<G>(get: &G, key: &str, default: String) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    validate_url(key, get(key).unwrap_or(default))
}

fn validate_url(key: &str, raw: String) -> Result<String, ConfigError> {
    // Validate the URL format
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(key.to_string(), e.to_string()))?;
    Ok(raw)
}
