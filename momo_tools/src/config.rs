use std::time::Duration;

use log::*;
use settle_common::{helpers::env_flag, Secret};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8400";
const DEFAULT_CURRENCY: &str = "XOF";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct MomoConfig {
    /// The root URL of the gateway API, e.g. "https://api.gateway.example"
    pub base_url: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    /// The merchant/site identifier assigned by the gateway
    pub site_id: String,
    /// ISO-4217 code of the currency all amounts are denominated in
    pub currency: String,
    /// Upper bound on any single gateway request, including connection set-up.
    pub timeout: Duration,
    /// When true, no network calls are made and every request succeeds with a synthetic correlation id.
    /// **Never enable this in production.**
    pub sandbox: bool,
}

impl Default for MomoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Secret::default(),
            api_secret: Secret::default(),
            site_id: String::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_TIMEOUT,
            sandbox: false,
        }
    }
}

impl MomoConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SPS_MOMO_BASE_URL").unwrap_or_else(|_| {
            warn!("SPS_MOMO_BASE_URL not set, using (probably useless) default {DEFAULT_BASE_URL}");
            DEFAULT_BASE_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("SPS_MOMO_API_KEY").unwrap_or_else(|_| {
            warn!("SPS_MOMO_API_KEY not set. Gateway authentication will fail.");
            String::default()
        }));
        let api_secret = Secret::new(std::env::var("SPS_MOMO_API_SECRET").unwrap_or_else(|_| {
            warn!("SPS_MOMO_API_SECRET not set. Gateway authentication will fail.");
            String::default()
        }));
        let site_id = std::env::var("SPS_MOMO_SITE_ID").unwrap_or_default();
        let currency = std::env::var("SPS_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.to_string());
        let timeout = std::env::var("SPS_MOMO_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid value for SPS_MOMO_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let sandbox = env_flag("SPS_MOMO_SANDBOX", false);
        if sandbox {
            warn!("🚨️ Mobile-money sandbox mode is ON. No real money will move. 🚨️");
        }
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            site_id,
            currency,
            timeout,
            sandbox,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
