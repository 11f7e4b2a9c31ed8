// src/api/feedback.rs

use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[utoipa::path(
    post,
    path = "/feedback",
    tag = "feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored"),
        (status = 400, description = "Missing job id or rating outside 1-5"),
        (status = 404, description = "Job not found for the caller")
    )
)]
#[post("/feedback")]
pub async fn submit_feedback(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<FeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let FeedbackRequest { job_id, rating, feedback } = payload.into_inner();

    let (Some(job_id), Some(rating)) = (job_id.filter(|id| !id.is_empty()), rating) else {
        return Err(ApiError::BadRequest("Job ID and rating required".to_string()));
    };
    if !(1..=5).contains(&rating) {
        return Err(ApiError::BadRequest("Rating must be between 1 and 5".to_string()));
    }
    if !db::job_owned_by(&state.pool, &job_id, &email).await? {
        return Err(ApiError::NotFound("Generation job"));
    }

    db::insert_feedback(&state.pool, &email, &job_id, rating, feedback.as_deref()).await?;

    if let Err(e) = db::track_event(&state.pool, &email, "feedback_submitted", json!({ "jobId": job_id, "rating": rating })).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
