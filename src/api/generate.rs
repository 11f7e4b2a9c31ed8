// src/api/generate.rs

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::generation::{GenerationOutcome, GenerationRequest, TokenUsage, Variation};
use crate::{billing, db, AppState};

const HISTORY_LIMIT: i64 = 20;
const RECENT_PAYMENTS: i64 = 10;

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub primary: Variation,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub variations: Vec<Variation>,
    pub tokens: TokenUsage,
    pub model: String,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            primary: outcome.primary,
            job_id: outcome.job_id,
            variations: outcome.variations,
            tokens: outcome.tokens,
            model: outcome.model,
        }
    }
}

fn limiter_key(req: &HttpRequest, email: Option<&str>, trust_proxy: bool) -> String {
    if let Some(email) = email {
        return format!("user:{email}");
    }
    if trust_proxy {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return format!("ip:{addr}");
        }
    }
    match req.peer_addr() {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/generate",
    tag = "generation",
    request_body = GenerationRequest,
    responses(
        (status = 200, description = "Primary variation plus every variation, token usage and model"),
        (status = 400, description = "Missing property address"),
        (status = 402, description = "Not enough credits"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Generation failed")
    )
)]
#[post("/generate")]
pub async fn generate(
    req: HttpRequest,
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<GenerationRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = identity.map(|i| i.into_inner().email);

    let key = limiter_key(&req, email.as_deref(), state.config.trust_proxy);
    if !state.limiter.check(&key) {
        log::warn!("rate limited user={}", email.as_deref().unwrap_or("guest"));
        return Err(ApiError::RateLimited);
    }

    let request = payload.into_inner();
    if let Some(email) = &email {
        db::ensure_user(&state.pool, email, state.config.free_credits_email).await?;
        let required = i64::from(request.variation_count());
        let available = billing::get_balance(&state.pool, Some(email)).await?.unwrap_or(0);
        if available < required {
            return Err(ApiError::NeedCredits { required, available });
        }
    }

    let outcome = state.generator.generate(email.as_deref(), request).await?;

    if let Some(email) = &email {
        for _ in 0..outcome.variations.len() {
            if !billing::debit(&state.pool, Some(email)).await? {
                log::warn!("balance ran out during debit user={email} job_id={}", outcome.job_id);
                break;
            }
        }

        let event = json!({
            "jobId": outcome.job_id,
            "variations": outcome.variations.len(),
            "tokens": outcome.tokens.prompt + outcome.tokens.completion,
        });
        if let Err(e) = db::track_event(&state.pool, email, "listing_generated", event).await {
            log::warn!("track event failed user={email}: {e}");
        }
    }

    Ok(HttpResponse::Ok().json(GenerateResponse::from(outcome)))
}

#[utoipa::path(get, path = "/history", tag = "generation", responses((status = 200, description = "Most recent jobs of the caller")))]
#[get("/history")]
pub async fn history(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let Some(identity) = identity else {
        return Ok(HttpResponse::Ok().json(json!({ "items": [] })));
    };

    let items = db::recent_jobs(&state.pool, &identity.email, HISTORY_LIMIT).await?;
    Ok(HttpResponse::Ok().json(json!({ "items": items })))
}

#[utoipa::path(get, path = "/usage", tag = "generation", responses((status = 200, description = "Token totals and recent payments"), (status = 401, description = "Login required")))]
#[get("/usage")]
pub async fn usage(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;

    let totals = db::usage_totals(&state.pool, &email).await?;
    let events = db::recent_billing_events(&state.pool, &email, RECENT_PAYMENTS).await?;
    Ok(HttpResponse::Ok().json(json!({ "totals": totals, "events": events })))
}
