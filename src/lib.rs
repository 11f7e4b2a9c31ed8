pub mod analytics;
pub mod api;
pub mod billing;
pub mod config;
pub mod db;
pub mod docs;
pub mod email;
pub mod enrichment;
pub mod error;
pub mod generation;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod prompt;
pub mod queue;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Instant;

use actix_web::web;
use sqlx::SqlitePool;

use crate::api::stripe_client::StripeClient;
use crate::config::Config;
use crate::email::Mailer;
use crate::generation::Generator;
use crate::queue::BatchQueue;
use crate::rate_limit::RateLimiter;

pub const JSON_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub generator: Generator,
    pub stripe: Option<StripeClient>,
    pub mailer: Mailer,
    pub batches: BatchQueue,
    pub limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the service objects from configuration. Spawns the batch worker,
    /// so it must run inside a tokio runtime.
    pub fn new(pool: SqlitePool, config: Config, generator: Generator) -> Self {
        let stripe = config
            .stripe_secret_key
            .as_deref()
            .map(|key| StripeClient::new(&config.stripe_api_base, key, config.http_timeout));
        let mailer = Mailer::new(
            &config.resend_api_base,
            config.resend_api_key.clone(),
            &config.email_from,
            config.http_timeout,
        );
        let batches = BatchQueue::start(pool.clone(), generator.clone(), config.batch_item_delay);
        let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_per_min));

        Self {
            pool,
            config: Arc::new(config),
            generator,
            stripe,
            mailer,
            batches,
            limiter,
            started_at: Instant::now(),
        }
    }
}

/// Every route of the service. The Stripe webhook handlers read the raw body
/// as bytes, so no JSON extraction happens before signature verification.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(api::stripe_webhook::stripe_webhook)
        .service(api::stripe_webhook::stripe_webhook_alias)
        .service(api::health::health)
        .service(api::health::healthz)
        .service(api::health::ping)
        .service(api::auth::signup)
        .service(api::auth::login)
        .service(api::auth::logout)
        .service(api::auth::me)
        .service(api::auth::credits)
        .service(api::generate::generate)
        .service(api::generate::history)
        .service(api::generate::usage)
        .service(api::billing::checkout)
        .service(api::billing::verify)
        .service(api::brands::list_brands)
        .service(api::brands::save_brand)
        .service(api::brands::delete_brand)
        .service(api::brands::default_brand)
        .service(api::templates::list_templates)
        .service(api::templates::save_template)
        .service(api::templates::delete_template)
        .service(api::subscriptions::current_subscription)
        .service(api::subscriptions::upgrade)
        .service(api::feedback::submit_feedback)
        .service(api::analytics::user_analytics)
        .service(api::analytics::admin_analytics)
        .service(api::batch::submit_batch)
        .service(api::batch::list_batches)
        .service(api::batch::get_batch)
        .service(api::export::export_pdf)
        .service(api::export::email_results);
}

/// JSON bodies up to 1 MiB; malformed bodies answer with the usual `{"error": ...}` shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err, _req| error::ApiError::BadRequest(err.to_string()).into())
}
