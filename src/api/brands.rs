// src/api/brands.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::api::auth::{require_login, Identity};
use crate::error::ApiError;
use crate::models::SaveBrandPreset;
use crate::{db, AppState};

#[utoipa::path(get, path = "/brands", tag = "brands", responses((status = 200, description = "Caller's brand presets, default first")))]
#[get("/brands")]
pub async fn list_brands(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let presets = db::list_brand_presets(&state.pool, &email).await?;
    Ok(HttpResponse::Ok().json(json!({ "presets": presets })))
}

#[utoipa::path(
    post,
    path = "/brands",
    tag = "brands",
    responses(
        (status = 200, description = "Preset saved"),
        (status = 403, description = "Plan limit reached"),
        (status = 404, description = "Preset to update not found")
    )
)]
#[post("/brands")]
pub async fn save_brand(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<SaveBrandPreset>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let preset = payload.into_inner();

    if preset.id.is_none() {
        let subscription = db::get_or_create_subscription(&state.pool, &email).await?;
        let existing = db::list_brand_presets(&state.pool, &email).await?.len() as i64;
        if existing >= subscription.max_brands {
            return Err(ApiError::Forbidden(format!(
                "Plan limited to {} brand presets. Upgrade to create more.",
                subscription.max_brands
            )));
        }
    }

    let id = db::save_brand_preset(&state.pool, &email, &preset)
        .await?
        .ok_or(ApiError::NotFound("Brand preset"))?;

    if let Err(e) = db::track_event(&state.pool, &email, "brand_preset_saved", json!({ "id": id, "name": preset.name })).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "id": id })))
}

#[utoipa::path(
    delete,
    path = "/brands/{id}",
    tag = "brands",
    params(("id" = String, Path, description = "Preset id")),
    responses((status = 200, description = "Preset deleted"), (status = 404, description = "Preset not found"))
)]
#[delete("/brands/{id}")]
pub async fn delete_brand(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let id = path.into_inner();

    if !db::delete_brand_preset(&state.pool, &email, &id).await? {
        return Err(ApiError::NotFound("Brand preset"));
    }

    if let Err(e) = db::track_event(&state.pool, &email, "brand_preset_deleted", json!({ "id": id })).await {
        log::warn!("track event failed user={email}: {e}");
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Single-preset view kept for older clients: the default preset, else the first.
#[utoipa::path(get, path = "/brand", tag = "brands", responses((status = 200, description = "Default preset or null")))]
#[get("/brand")]
pub async fn default_brand(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let presets = db::list_brand_presets(&state.pool, &email).await?;
    let preset = presets
        .iter()
        .find(|p| p.is_default)
        .or_else(|| presets.first());
    Ok(HttpResponse::Ok().json(json!({ "preset": preset })))
}
