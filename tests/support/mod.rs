#![allow(dead_code, unused_macros)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use listing_agent::api::auth::issue_token;
use listing_agent::api::stripe_signature;
use listing_agent::config::{Config, Pack};
use listing_agent::generation::Generator;
use listing_agent::llm::{ChatMessage, Completion, LanguageModel, LlmError};
use listing_agent::AppState;

/// Full application with session resolution, as `main` wires it.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state))
                .app_data(listing_agent::json_config())
                .wrap(listing_agent::api::auth::SessionMiddleware)
                .configure(listing_agent::routes),
        )
        .await
    };
}

pub const SESSION_SECRET: &str = "test-session-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// A fresh migrated in-memory database. One connection keeps every query on
/// the same memory database.
pub async fn init_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}

pub fn test_config() -> Config {
    let mut packs = BTreeMap::new();
    packs.insert(
        "20".to_string(),
        Pack {
            price_id: "price_20".to_string(),
            credits: 20,
        },
    );

    Config {
        session_secret: SESSION_SECRET.to_string(),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        packs,
        payments_enabled: true,
        bcrypt_cost: 4,
        batch_item_delay: Duration::ZERO,
        ..Config::default()
    }
}

/// Which drafts the scripted model hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Valid,
    BrokenDraft,
    /// Never answers within any test deadline.
    Hang,
}

/// Answers drafting calls with canned listing copy and compliance calls with
/// one finding. Counts every call.
pub struct ScriptedModel {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

pub fn listing_copy() -> serde_json::Value {
    json!({
        "description_mls": "Sunny two bedroom home close to the park.",
        "bullets": ["Renovated kitchen", "Two car garage", "Large backyard"],
        "social_caption": "Just listed! #newlisting"
    })
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete_json(&self, messages: &[ChatMessage]) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script == Script::Hang {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        let is_review = messages
            .last()
            .is_some_and(|m| m.content.starts_with("{\"texts\""));
        let text = if is_review {
            json!({
                "flags": [{
                    "type": "fair_housing",
                    "original": "close to the park",
                    "suggest": "near a park",
                    "note": "review wording"
                }]
            })
            .to_string()
        } else {
            match self.script {
                Script::Valid => listing_copy().to_string(),
                Script::BrokenDraft | Script::Hang => "this is not json".to_string(),
            }
        };

        Ok(Completion {
            text,
            input_tokens: 10,
            output_tokens: 20,
        })
    }
}

pub fn generator(pool: &SqlitePool, model: Arc<ScriptedModel>) -> Generator {
    Generator::new(pool.clone(), model, Duration::from_secs(5))
}

pub fn impatient_generator(pool: &SqlitePool, model: Arc<ScriptedModel>) -> Generator {
    Generator::new(pool.clone(), model, Duration::from_millis(50))
}

pub fn build_state(pool: SqlitePool, config: Config, model: Arc<ScriptedModel>) -> AppState {
    let generator = generator(&pool, model);
    AppState::new(pool, config, generator)
}

pub fn bearer(email: &str) -> (&'static str, String) {
    let token = issue_token(SESSION_SECRET, email).expect("token");
    ("Authorization", format!("Bearer {token}"))
}

pub fn stripe_signature_header(payload: &[u8]) -> String {
    stripe_signature::header_value(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), payload)
        .expect("sign payload")
}

pub fn checkout_completed(session_id: &str, email: &str, credits: u32) -> serde_json::Value {
    json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "payment_status": "paid",
                "customer_details": { "email": email },
                "metadata": { "pack": credits.to_string(), "credits": credits.to_string() }
            }
        }
    })
}
