// src/api/subscriptions.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::models::Plan;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpgradeRequest {
    #[serde(default)]
    pub plan: String,
}

#[utoipa::path(get, path = "/subscription", tag = "subscriptions", responses((status = 200, description = "Caller's plan and limits")))]
#[get("/subscription")]
pub async fn current_subscription(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let subscription = db::get_or_create_subscription(&state.pool, &email).await?;
    Ok(HttpResponse::Ok().json(json!({ "subscription": subscription })))
}

#[utoipa::path(
    post,
    path = "/subscription/upgrade",
    tag = "subscriptions",
    request_body = UpgradeRequest,
    responses((status = 200, description = "Plan switched"), (status = 400, description = "Invalid plan"))
)]
#[post("/subscription/upgrade")]
pub async fn upgrade(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<UpgradeRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let plan = Plan::parse(payload.plan.trim())
        .ok_or_else(|| ApiError::BadRequest("Invalid plan".to_string()))?;

    let subscription = db::set_plan(&state.pool, &email, plan).await?;
    log::info!("plan changed user={email} plan={}", plan.as_str());

    if let Err(e) = db::track_event(&state.pool, &email, "subscription_updated", json!({ "plan": plan.as_str() })).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "subscription": subscription })))
}
