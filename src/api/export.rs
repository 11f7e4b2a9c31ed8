// src/api/export.rs

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::api::auth::{require_login, Identity};
use crate::email::{listing_html, listing_subject, Attachment, EmailError};
use crate::error::ApiError;
use crate::pdf::{render_listing_package, ListingPackage};
use crate::AppState;

const PDF_FILENAME: &str = "listing_package.pdf";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExportOutputs {
    #[serde(default)]
    pub description_mls: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub social_caption: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportRequest {
    /// Only `address` is read.
    #[serde(default)]
    pub property: Value,
    #[serde(default)]
    pub outputs: ExportOutputs,
    /// Recipient for `/email`; defaults to the caller.
    #[serde(default)]
    pub to: Option<String>,
}

impl ExportRequest {
    fn package(&self) -> ListingPackage {
        ListingPackage {
            address: self
                .property
                .get("address")
                .and_then(|a| a.as_str())
                .unwrap_or_default()
                .to_string(),
            description_mls: self.outputs.description_mls.clone(),
            bullets: self.outputs.bullets.clone(),
            social_caption: self.outputs.social_caption.clone(),
        }
    }
}

fn render(package: &ListingPackage) -> Result<Vec<u8>, ApiError> {
    render_listing_package(package).map_err(|e| {
        log::error!("pdf render failed: {e}");
        ApiError::Internal(e.to_string())
    })
}

#[utoipa::path(
    post,
    path = "/export/pdf",
    tag = "export",
    request_body = ExportRequest,
    responses((status = 200, description = "PDF attachment", content_type = "application/pdf"), (status = 401, description = "Login required"))
)]
#[post("/export/pdf")]
pub async fn export_pdf(
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<ExportRequest>,
) -> Result<HttpResponse, ApiError> {
    require_login(identity)?;
    let bytes = render(&payload.package())?;

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(PDF_FILENAME.to_string())],
        })
        .body(bytes))
}

#[utoipa::path(
    post,
    path = "/email",
    tag = "export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Email sent"),
        (status = 400, description = "Invalid recipient"),
        (status = 502, description = "Email provider error")
    )
)]
#[post("/email")]
pub async fn email_results(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: web::Json<ExportRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;
    let request = payload.into_inner();

    let to = request
        .to
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(email.as_str())
        .to_string();
    if !to.contains('@') {
        return Err(ApiError::BadRequest("Invalid recipient".to_string()));
    }

    let package = request.package();
    let attachment = Attachment {
        filename: PDF_FILENAME.to_string(),
        content: render(&package)?,
    };

    let id = state
        .mailer
        .send(&to, &listing_subject(&package), &listing_html(&package), &[attachment])
        .await
        .map_err(|e| match e {
            EmailError::NotConfigured => ApiError::BadRequest(e.to_string()),
            other => {
                log::error!("email send failed user={email}: {other}");
                ApiError::Upstream(other.to_string())
            }
        })?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "id": id })))
}
