use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use momo_tools::MomoConfig;
use settle_common::{helpers::env_flag, Secret};
use settlement_engine::{settlement_objects::SettlementConfig, CommissionRate, DEFAULT_SETTINGS_TTL};

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 4444;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
const DEFAULT_CURRENCY: &str = "XOF";
const DEFAULT_CURRENCY_DECIMALS: u32 = 0;
const DEFAULT_COMMISSION_RATE: &str = "0.05";
const DEFAULT_RECONCILE_AFTER: chrono::Duration = chrono::Duration::minutes(30);
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" | "staging" => Ok(Self::Development),
            s => Err(format!("'{s}' is not a known environment")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub environment: Environment,
    /// The externally reachable root URL of this server. The gateway delivers callbacks beneath it.
    pub callback_base_url: String,
    /// Shared secret the gateway signs callback bodies with
    pub callback_hmac_secret: Secret<String>,
    /// If false, callback signatures are not checked. **DANGER**
    pub callback_hmac_checks: bool,
    /// The commission rate used when no rate has been stored in the platform settings.
    pub default_commission_rate: CommissionRate,
    pub settings_ttl: Duration,
    pub currency: String,
    /// Number of decimal places in the currency's major unit. Inbound amounts are normalised with this.
    pub currency_decimals: u32,
    /// Collections still waiting for a result after this long are checked with the gateway.
    pub reconcile_after: chrono::Duration,
    pub reconcile_interval: Duration,
    pub stats_refresh_interval: Duration,
    pub momo: MomoConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            environment: Environment::default(),
            callback_base_url: format!("http://{DEFAULT_SPS_HOST}:{DEFAULT_SPS_PORT}"),
            callback_hmac_secret: Secret::default(),
            callback_hmac_checks: true,
            default_commission_rate: default_commission_rate(),
            settings_ttl: DEFAULT_SETTINGS_TTL,
            currency: DEFAULT_CURRENCY.to_string(),
            currency_decimals: DEFAULT_CURRENCY_DECIMALS,
            reconcile_after: DEFAULT_RECONCILE_AFTER,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            stats_refresh_interval: DEFAULT_STATS_REFRESH_INTERVAL,
            momo: MomoConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = parse_env("SPS_PORT", DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let environment = parse_env("SPS_ENVIRONMENT", Environment::Development);
        let callback_base_url = env::var("SPS_CALLBACK_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!(
                    "🪛️ SPS_CALLBACK_BASE_URL is not set. The gateway will be told to deliver callbacks to \
                     {host}:{port}, which is probably not reachable from outside."
                );
                format!("http://{host}:{port}")
            });
        let callback_hmac_secret = Secret::new(env::var("SPS_CALLBACK_HMAC_SECRET").unwrap_or_default());
        let callback_hmac_checks = env_flag("SPS_CALLBACK_HMAC_CHECKS", true);
        if !callback_hmac_checks {
            warn!("🚨️ Callback signature checks are DISABLED. Anyone can post payment results to this server.");
        } else if !callback_hmac_secret.is_set() {
            error!("🪛️ SPS_CALLBACK_HMAC_SECRET is not set. Every gateway callback will be rejected.");
        }
        let default_commission_rate = env::var("SPS_DEFAULT_COMMISSION_RATE")
            .ok()
            .and_then(|s| {
                s.parse::<CommissionRate>()
                    .map_err(|e| {
                        error!("🪛️ Invalid SPS_DEFAULT_COMMISSION_RATE. {e}. Using {DEFAULT_COMMISSION_RATE}.")
                    })
                    .ok()
            })
            .unwrap_or_else(default_commission_rate);
        let settings_ttl = Duration::from_secs(parse_env("SPS_SETTINGS_TTL_SECS", DEFAULT_SETTINGS_TTL.as_secs()));
        let currency = env::var("SPS_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.to_string());
        let currency_decimals = parse_env("SPS_CURRENCY_DECIMALS", DEFAULT_CURRENCY_DECIMALS);
        let reconcile_after = chrono::Duration::minutes(parse_env(
            "SPS_RECONCILE_AFTER_MINS",
            DEFAULT_RECONCILE_AFTER.num_minutes(),
        ));
        let reconcile_interval =
            Duration::from_secs(parse_env("SPS_RECONCILE_INTERVAL_SECS", DEFAULT_RECONCILE_INTERVAL.as_secs()));
        let stats_refresh_interval =
            Duration::from_secs(parse_env("SPS_STATS_REFRESH_SECS", DEFAULT_STATS_REFRESH_INTERVAL.as_secs()));
        let momo = MomoConfig::new_from_env_or_default();
        let config = Self {
            host,
            port,
            database_url,
            environment,
            callback_base_url,
            callback_hmac_secret,
            callback_hmac_checks,
            default_commission_rate,
            settings_ttl,
            currency,
            currency_decimals,
            reconcile_after,
            reconcile_interval,
            stats_refresh_interval,
            momo,
        };
        config.with_environment_rules()
    }

    /// Sandbox mode is never allowed in production.
    pub fn with_environment_rules(mut self) -> Self {
        if self.environment == Environment::Production && self.momo.sandbox {
            error!(
                "🚨️ SPS_MOMO_SANDBOX was requested in a production environment. Sandbox mode has been switched \
                 OFF."
            );
            self.momo.sandbox = false;
        }
        self
    }

    pub fn settlement_config(&self) -> SettlementConfig {
        SettlementConfig { callback_base_url: self.callback_base_url.clone(), currency: self.currency.clone() }
    }
}

fn default_commission_rate() -> CommissionRate {
    DEFAULT_COMMISSION_RATE.parse().unwrap_or_else(|_| CommissionRate::zero())
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that request handlers need. Keeps secrets out of the handlers' reach.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub currency_decimals: u32,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { currency_decimals: config.currency_decimals }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}
