// API Versions
pub const FACEBOOK_API_VERSION: &str = "v23.0";
pub const GOOGLE_ADS_API_VERSION: &str = "v16";

// API Base URLs
pub const FACEBOOK_BASE_URL: &str = "https://graph.facebook.com";
pub const GOOGLE_ADS_BASE_URL: &str = "https://googleads.googleapis.com";

// Headers
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const DEVELOPER_TOKEN_HEADER: &str = "developer-token";
pub const LOGIN_CUSTOMER_ID_HEADER: &str = "login-customer-id";
pub const PROVIDER_HEADER: &str = "x-ad-provider";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

// Service defaults
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 1095; // Facebook keeps 37 months of insights
pub const DEFAULT_AD_GROUP_CAP: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AGGREGATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REPORTING_TIMEZONE: &str = "UTC";

// Facebook pagination
pub const FB_PAGE_LIMIT: &str = "500";
pub const FB_MAX_PAGES: usize = 50;

// Facebook API Fields
pub const FB_ACCOUNT_FIELDS: &str = "id,name,account_status,currency,timezone_name";
pub const FB_CAMPAIGN_FIELDS: &str = "id,name,status,objective,start_time,stop_time,bid_strategy";
pub const FB_INSIGHT_FIELDS: &str = "impressions,reach,frequency,clicks,spend,cpc,cpm,ctr,actions,action_values,cost_per_action_type";
pub const FB_ADSET_INSIGHT_FIELDS: &str = "adset_id,adset_name,impressions,reach,frequency,clicks,spend,cpc,cpm,ctr,actions,action_values,cost_per_action_type";
pub const FB_CREATIVE_FIELDS: &str = "id,name,creative{id,name,title,body,image_url,thumbnail_url,call_to_action_type}";

// Action types counted as conversions, highest priority first
pub const FB_CONVERSION_ACTION_TYPES: &[&str] = &[
    "offsite_conversion.fb_pixel_purchase",
    "purchase",
    "offsite_conversion.fb_pixel_custom",
    "lead",
    "complete_registration",
];

// Facebook error codes
pub const FB_INVALID_TOKEN_CODE: i64 = 190;
pub const FB_UNKNOWN_OBJECT_CODE: i64 = 100;
pub const FB_UNKNOWN_OBJECT_SUBCODE: i64 = 33;
pub const FB_THROTTLE_CODES: &[i64] = &[4, 17, 32, 613];

// Google Ads metric selection shared by every GAQL insights query
pub const GADS_METRIC_FIELDS: &str = "metrics.impressions, metrics.clicks, metrics.cost_micros, metrics.ctr, metrics.average_cpc, metrics.average_cpm, metrics.conversions, metrics.conversions_value, metrics.cost_per_conversion";

pub const MICROS_PER_UNIT: i64 = 1_000_000;
