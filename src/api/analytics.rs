// src/api/analytics.rs

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::analytics::{self, timeframe_days};
use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::{db, AppState};

const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimeframeQuery {
    /// Window such as `7d` or `30d`.
    pub timeframe: Option<String>,
}

#[utoipa::path(
    get,
    path = "/analytics",
    tag = "analytics",
    responses((status = 200, description = "Caller's usage report"), (status = 403, description = "Pro plan required"))
)]
#[get("/analytics")]
pub async fn user_analytics(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;

    let subscription = db::get_or_create_subscription(&state.pool, &email).await?;
    if !subscription.analytics_access {
        return Err(ApiError::Forbidden("Analytics requires Pro plan".to_string()));
    }

    let report = analytics::user_analytics(&state.pool, &email, HISTORY_LIMIT).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/admin/analytics",
    tag = "analytics",
    params(TimeframeQuery),
    responses((status = 200, description = "Service-wide aggregates"), (status = 403, description = "Admin access required"))
)]
#[get("/admin/analytics")]
pub async fn admin_analytics(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    query: web::Query<TimeframeQuery>,
) -> Result<HttpResponse, ApiError> {
    let email = identity.map(|i| i.into_inner().email);
    let is_admin = match (email.as_deref(), state.config.admin_email.as_deref()) {
        (Some(email), Some(admin)) => email.eq_ignore_ascii_case(admin),
        _ => false,
    };
    if !is_admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    let days = timeframe_days(query.timeframe.as_deref());
    let report = analytics::admin_analytics(&state.pool, days).await?;
    Ok(HttpResponse::Ok().json(report))
}
