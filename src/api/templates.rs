// src/api/templates.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::models::SavePropertyTemplate;
use crate::{db, AppState};

#[utoipa::path(get, path = "/templates", tag = "templates", responses((status = 200, description = "Own and shared templates, most used first")))]
#[get("/templates")]
pub async fn list_templates(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let templates = db::list_templates(&state.pool, &email).await?;
    Ok(HttpResponse::Ok().json(json!({ "templates": templates })))
}

#[utoipa::path(
    post,
    path = "/templates",
    tag = "templates",
    responses(
        (status = 200, description = "Template saved"),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Plan limit reached"),
        (status = 404, description = "Template to update not found")
    )
)]
#[post("/templates")]
pub async fn save_template(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<SavePropertyTemplate>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let template = payload.into_inner();

    if template.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Template name is required".to_string()));
    }
    if !template.template_data.is_null() && !template.template_data.is_object() {
        return Err(ApiError::BadRequest("template_data must be an object".to_string()));
    }

    if template.id.is_none() {
        let subscription = db::get_or_create_subscription(&state.pool, &email).await?;
        let own = db::count_own_templates(&state.pool, &email).await?;
        if own >= subscription.max_templates {
            return Err(ApiError::Forbidden(format!(
                "Plan limited to {} templates. Upgrade to create more.",
                subscription.max_templates
            )));
        }
    }

    let saved = db::save_template(&state.pool, &email, &template)
        .await?
        .ok_or(ApiError::NotFound("Template"))?;

    let event = json!({ "id": saved.id, "name": saved.name, "type": saved.property_type });
    if let Err(e) = db::track_event(&state.pool, &email, "template_saved", event).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "template": saved })))
}

#[utoipa::path(
    delete,
    path = "/templates/{id}",
    tag = "templates",
    params(("id" = String, Path, description = "Template id")),
    responses((status = 200, description = "Template deleted"), (status = 404, description = "Template not found"))
)]
#[delete("/templates/{id}")]
pub async fn delete_template(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let id = path.into_inner();

    if !db::delete_template(&state.pool, &email, &id).await? {
        return Err(ApiError::NotFound("Template"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
