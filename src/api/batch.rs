// src/api/batch.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::queue::validate_batch;
use crate::{billing, db, AppState};

const LIST_LIMIT: i64 = 20;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Generation requests, each with at least `property.address` and `property.type`.
    #[serde(default)]
    pub properties: Vec<Value>,
}

#[utoipa::path(
    post,
    path = "/batch/process",
    tag = "batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Batch accepted"),
        (status = 400, description = "Validation errors"),
        (status = 402, description = "Not enough credits for every item"),
        (status = 403, description = "Pro plan required")
    )
)]
#[post("/batch/process")]
pub async fn submit_batch(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<BatchRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;

    let subscription = db::get_or_create_subscription(&state.pool, &email).await?;
    if !subscription.batch_processing {
        return Err(ApiError::Forbidden("Batch processing requires Pro plan".to_string()));
    }

    let properties = payload.into_inner().properties;
    let errors = validate_batch(&properties);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let required = properties.len() as i64;
    let available = billing::get_balance(&state.pool, Some(&email)).await?.unwrap_or(0);
    if available < required {
        return Err(ApiError::NeedCredits { required, available });
    }

    let batch_id = db::create_batch_job(&state.pool, &email, &properties).await?;
    state.batches.submit(batch_id.clone()).map_err(|e| {
        log::error!("batch submit failed batch_id={batch_id}: {e}");
        ApiError::Internal(e.to_string())
    })?;
    log::info!("batch queued user={email} batch_id={batch_id} items={required}");

    let event = json!({ "batchId": batch_id, "propertyCount": required });
    if let Err(e) = db::track_event(&state.pool, &email, "batch_started", event).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "batchId": batch_id, "status": "pending" })))
}

#[utoipa::path(
    get,
    path = "/batch/{id}",
    tag = "batch",
    params(("id" = String, Path, description = "Batch id")),
    responses((status = 200, description = "Status, counts and per-item results"), (status = 404, description = "Batch job not found"))
)]
#[get("/batch/{id}")]
pub async fn get_batch(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let job = db::get_batch_job(&state.pool, &email, &path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Batch job"))?;
    Ok(HttpResponse::Ok().json(job))
}

#[utoipa::path(get, path = "/batch", tag = "batch", responses((status = 200, description = "Most recent batch jobs")))]
#[get("/batch")]
pub async fn list_batches(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let jobs: Vec<Value> = db::list_batch_jobs(&state.pool, &email, LIST_LIMIT)
        .await?
        .into_iter()
        .map(|job| {
            json!({
                "id": job.id,
                "status": job.status,
                "total": job.total,
                "completed": job.completed,
                "created_at": job.created_at,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "jobs": jobs })))
}
