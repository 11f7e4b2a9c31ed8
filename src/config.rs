// src/config.rs

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// A purchasable credit bundle. The pack key is the number of credits it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    pub price_id: String,
    pub credits: u32,
}

const PACK_KEYS: [u32; 4] = [10, 20, 50, 100];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session_secret: String,

    pub free_credits_email: u32,
    pub free_credits_guest: u32,
    pub rate_limit_per_min: u32,
    /// Key guests by `X-Forwarded-For`/`Forwarded` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub llm_timeout: Duration,
    /// Deadline for each Stripe and Resend request.
    pub http_timeout: Duration,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub packs: BTreeMap<String, Pack>,
    pub payments_enabled: bool,
    pub payments_secret: Option<String>,
    pub app_base_url: String,

    pub resend_api_key: Option<String>,
    pub resend_api_base: String,
    pub email_from: String,

    pub admin_email: Option<String>,
    pub bcrypt_cost: u32,
    pub batch_item_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/app.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            session_secret: "dev_insecure".to_string(),
            free_credits_email: 5,
            free_credits_guest: 3,
            rate_limit_per_min: 10,
            trust_proxy: false,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            llm_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(15),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            packs: BTreeMap::new(),
            payments_enabled: false,
            payments_secret: None,
            app_base_url: "http://localhost:3000".to_string(),
            resend_api_key: None,
            resend_api_base: "https://api.resend.com".to_string(),
            email_from: "listings@example.com".to_string(),
            admin_email: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            batch_item_delay: Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut packs = BTreeMap::new();
        for credits in PACK_KEYS {
            if let Some(price_id) = non_empty(&format!("STRIPE_PRICE_{credits}")) {
                packs.insert(credits.to_string(), Pack { price_id, credits });
            }
        }

        let session_secret = non_empty("SESSION_SECRET").unwrap_or_else(|| {
            log::warn!("SESSION_SECRET not set, using an insecure development key");
            defaults.session_secret.clone()
        });

        Ok(Self {
            database_url: non_empty("DATABASE_URL").unwrap_or(defaults.database_url),
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port)?,
            session_secret,
            free_credits_email: parse_or("FREE_CREDITS_EMAIL", defaults.free_credits_email)?,
            free_credits_guest: parse_or("FREE_CREDITS_GUEST", defaults.free_credits_guest)?,
            rate_limit_per_min: parse_or("RATE_LIMIT_PER_MIN", defaults.rate_limit_per_min)?,
            trust_proxy: flag("TRUST_PROXY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            llm_timeout: Duration::from_secs(parse_or("LLM_TIMEOUT_SECS", 60u64)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 15u64)?),
            stripe_secret_key: non_empty("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: non_empty("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            packs,
            payments_enabled: flag("PAYMENTS_ENABLED"),
            payments_secret: non_empty("PAYMENTS_SECRET"),
            app_base_url: non_empty("APP_BASE_URL").unwrap_or(defaults.app_base_url),
            resend_api_key: non_empty("RESEND_API_KEY"),
            resend_api_base: non_empty("RESEND_API_BASE").unwrap_or(defaults.resend_api_base),
            email_from: non_empty("EMAIL_FROM").unwrap_or(defaults.email_from),
            admin_email: non_empty("ADMIN_EMAIL"),
            bcrypt_cost: parse_or("BCRYPT_COST", defaults.bcrypt_cost)?,
            batch_item_delay: Duration::from_millis(parse_or("BATCH_ITEM_DELAY_MS", 500u64)?),
        })
    }

    pub fn pack(&self, key: &str) -> Option<&Pack> {
        self.packs.get(key)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(key: &str) -> bool {
    non_empty(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
