// src/main.rs
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use listing_agent::config::Config;
use listing_agent::generation::Generator;
use listing_agent::llm::OpenAiClient;
use listing_agent::{api, docs, json_config, routes, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

/// `sqlite://data/app.db?mode=rwc` -> `data/app.db`
fn database_file(url: &str) -> Option<&str> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then_some(path)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;

    if let Some(parent) = database_file(&config.database_url).and_then(|f| Path::new(f).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(io::Error::other)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(io::Error::other)?;

    sqlx::migrate!().run(&pool).await.map_err(io::Error::other)?;

    if config.openai_api_key.is_none() {
        log::warn!("OPENAI_API_KEY not set, generation requests will fail");
    }
    if config.payments_enabled && config.stripe_webhook_secret.is_none() {
        log::warn!("payments enabled without STRIPE_WEBHOOK_SECRET, every webhook will be rejected");
    }

    let model = OpenAiClient::new(
        &config.openai_base_url,
        config.openai_api_key.as_deref().unwrap_or_default(),
        &config.openai_model,
    );
    let generator = Generator::new(pool.clone(), Arc::new(model), config.llm_timeout);

    let bind = (config.host.clone(), config.port);
    let state = AppState::new(pool.clone(), config, generator);

    if let Err(e) = state.batches.resume(&pool).await {
        log::error!("failed to resume batches: {e}");
    }

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            limiter.prune();
        }
    });

    let state = web::Data::new(state);
    log::info!("listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .wrap(api::auth::SessionMiddleware)
            .wrap(Logger::default())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(routes)
    })
    .bind(bind)?
    .run()
    .await
}
