use reqwest::Response;
use serde_json::Value;
use tracing::debug;

use crate::constants::{
    FB_INVALID_TOKEN_CODE, FB_THROTTLE_CODES, FB_UNKNOWN_OBJECT_CODE, FB_UNKNOWN_OBJECT_SUBCODE,
    RETRY_AFTER_HEADER,
};
use crate::error::AdsError;
use crate::models::Provider;

/// Error payload as both vendors shape it: `{"error": {...}}`, possibly wrapped in an array.
#[derive(Debug, Default, PartialEq)]
struct VendorError {
    message: Option<String>,
    code: Option<i64>,
    subcode: Option<i64>,
}

fn parse_vendor_error(body: &str) -> VendorError {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return VendorError::default(),
    };
    let error = match &value {
        Value::Array(items) => items.first().and_then(|item| item.get("error")),
        _ => value.get("error"),
    };
    let Some(error) = error else {
        return VendorError::default();
    };

    VendorError {
        message: error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        code: error.get("code").and_then(Value::as_i64),
        subcode: error.get("error_subcode").and_then(Value::as_i64),
    }
}

/// Map a non-success vendor response into the error taxonomy.
pub fn classify_failure(
    provider: Provider,
    status: u16,
    retry_after: Option<u64>,
    body: &str,
) -> AdsError {
    let vendor = parse_vendor_error(body);
    let is_facebook = provider == Provider::Facebook;
    let fb_code = vendor.code.filter(|_| is_facebook);

    if status == 429 || fb_code.is_some_and(|code| FB_THROTTLE_CODES.contains(&code)) {
        return AdsError::RateLimited {
            provider,
            retry_after,
        };
    }

    let message = vendor
        .message
        .clone()
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == 401 || status == 403 || fb_code == Some(FB_INVALID_TOKEN_CODE) {
        return AdsError::Unauthorized(message);
    }

    if status == 404
        || (fb_code == Some(FB_UNKNOWN_OBJECT_CODE)
            && vendor.subcode == Some(FB_UNKNOWN_OBJECT_SUBCODE))
    {
        return AdsError::NotFound(message);
    }

    AdsError::ProviderRequest {
        provider,
        status,
        code: vendor.code,
        message,
    }
}

pub fn transport_error(provider: Provider, error: reqwest::Error) -> AdsError {
    // The request URL can carry an access token.
    let error = error.without_url();
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else {
        error.to_string()
    };
    AdsError::Transport { provider, message }
}

/// Read a vendor response as JSON, classifying non-success statuses.
pub async fn read_json(provider: Provider, response: Response) -> Result<Value, AdsError> {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !(200..300).contains(&status) {
        debug!(%provider, status, "vendor request failed");
        return Err(classify_failure(provider, status, retry_after, &body));
    }

    serde_json::from_str(&body).map_err(|e| AdsError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}
