// src/api/billing.rs

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::auth::{normalize_email, require_login, Identity};
use crate::api::stripe_client::{is_valid_session_id, CheckoutRequest, StripeClient};
use crate::billing::{self, ConfirmedPayment, PaymentOutcome};
use crate::error::ApiError;
use crate::AppState;

pub const PAYMENTS_SECRET_HEADER: &str = "x-payments-secret";
const DEFAULT_PACK: &str = "20";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutBody {
    #[serde(default)]
    pub pack: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    pub session_id: Option<String>,
}

fn stripe(state: &AppState) -> Result<&StripeClient, ApiError> {
    state.stripe.as_ref().ok_or_else(|| {
        log::error!("stripe secret key is not configured");
        ApiError::Internal("payment provider not configured".to_string())
    })
}

#[utoipa::path(
    post,
    path = "/billing/checkout",
    tag = "billing",
    request_body = CheckoutBody,
    responses(
        (status = 200, description = "Hosted checkout URL"),
        (status = 400, description = "Unknown or unconfigured pack"),
        (status = 401, description = "Login required or wrong payments secret"),
        (status = 503, description = "Payments are disabled")
    )
)]
#[post("/billing/checkout")]
pub async fn checkout(
    req: HttpRequest,
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    payload: Option<web::Json<CheckoutBody>>,
) -> Result<HttpResponse, ApiError> {
    if !state.config.payments_enabled {
        return Err(ApiError::PaymentsDisabled);
    }

    if let Some(expected) = state.config.payments_secret.as_deref() {
        let given = req
            .headers()
            .get(PAYMENTS_SECRET_HEADER)
            .and_then(|h| h.to_str().ok());
        if given != Some(expected) {
            log::warn!("checkout rejected, payments secret mismatch");
            return Err(ApiError::InvalidSecret);
        }
    }

    let email = require_login(identity)?;
    let body = payload.map(|p| p.into_inner()).unwrap_or_default();
    let pack_key = body.pack.unwrap_or_else(|| DEFAULT_PACK.to_string());

    let pack = state
        .config
        .pack(&pack_key)
        .ok_or_else(|| ApiError::BadRequest("Unknown or unconfigured pack".to_string()))?;

    let base = state.config.app_base_url.trim_end_matches('/');
    let session = stripe(&state)?
        .create_checkout_session(&CheckoutRequest {
            price_id: &pack.price_id,
            pack: &pack_key,
            credits: pack.credits,
            email: &email,
            success_url: format!("{base}/?checkout=success&session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/?checkout=cancel"),
        })
        .await
        .map_err(|e| {
            log::error!("stripe checkout error user={email}: {e}");
            ApiError::Upstream(e.to_string())
        })?;

    let url = session
        .url
        .ok_or_else(|| ApiError::Upstream("checkout session has no url".to_string()))?;

    log::info!("checkout created user={email} pack={pack_key} session_id={}", session.id);
    Ok(HttpResponse::Ok().json(json!({ "url": url, "id": session.id })))
}

#[utoipa::path(
    get,
    path = "/billing/verify",
    tag = "billing",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Session reconciled"),
        (status = 400, description = "Missing session id or unpaid session"),
        (status = 403, description = "Session belongs to another account")
    )
)]
#[get("/billing/verify")]
pub async fn verify(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
    query: web::Query<VerifyQuery>,
) -> Result<HttpResponse, ApiError> {
    let email = require_login(identity)?;

    let session_id = query
        .into_inner()
        .session_id
        .filter(|id| is_valid_session_id(id))
        .ok_or_else(|| ApiError::BadRequest("Missing or invalid session_id".to_string()))?;

    let session = stripe(&state)?
        .retrieve_checkout_session(&session_id)
        .await
        .map_err(|e| {
            log::error!("stripe retrieve error session_id={session_id}: {e}");
            ApiError::Upstream(e.to_string())
        })?;

    if !session.is_paid() {
        return Err(ApiError::BadRequest("Payment not completed".to_string()));
    }

    let owner = session.email().map(normalize_email);
    if owner.as_deref() != Some(email.as_str()) {
        log::warn!("verify rejected user={email} session_id={session_id}");
        return Err(ApiError::Forbidden("Checkout session belongs to another account".to_string()));
    }

    let credits = session
        .credits()
        .ok_or_else(|| ApiError::BadRequest("Checkout session carries no credits".to_string()))?;

    let outcome = billing::record_payment(
        &state.pool,
        &ConfirmedPayment {
            email: &email,
            credits,
            checkout_id: &session.id,
            price_id: session.price_id(),
        },
    )
    .await?;

    let credits_added = if outcome == PaymentOutcome::Credited { credits } else { 0 };
    let balance = billing::get_balance(&state.pool, Some(&email)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "reconciled": outcome != PaymentOutcome::UnknownUser,
        "credits_added": credits_added,
        "credits": balance,
    })))
}
