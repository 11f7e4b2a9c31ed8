// src/api/stripe_webhook.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::normalize_email;
use crate::api::stripe_client::CheckoutSession;
use crate::api::stripe_signature;
use crate::billing::{self, ConfirmedPayment, PaymentOutcome};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

async fn handle_stripe_webhook(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    // acknowledge so the provider stops retrying
    if !state.config.payments_enabled {
        log::info!("stripe webhook ignored, payments disabled");
        return HttpResponse::Ok().json(json!({ "ignored": true, "reason": "payments_disabled" }));
    }

    let header = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());
    if let Err(e) = stripe_signature::verify(
        state.config.stripe_webhook_secret.as_deref(),
        header,
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        log::warn!("stripe webhook signature verification failed: {e}");
        return HttpResponse::BadRequest().body(format!("Webhook Error: {e}"));
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("stripe webhook payload error: {e}");
            return HttpResponse::BadRequest().body(format!("Webhook Error: {e}"));
        }
    };

    if event.kind != CHECKOUT_COMPLETED {
        log::info!("stripe webhook unhandled event_id={} type={}", event.id, event.kind);
        return HttpResponse::Ok().json(json!({ "received": true }));
    }

    let session: CheckoutSession = match serde_json::from_value(event.data.object) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("stripe webhook session parse error event_id={}: {e}", event.id);
            return HttpResponse::BadRequest().body(format!("Webhook Error: {e}"));
        }
    };

    let (Some(email), Some(credits)) = (session.email().map(normalize_email), session.credits()) else {
        log::warn!(
            "checkout completed without email or credits event_id={} session_id={}",
            event.id,
            session.id
        );
        return HttpResponse::Ok().json(json!({ "received": true }));
    };

    // the event payload omits line items; fetch them for the price id
    let price_id = match &state.stripe {
        Some(stripe) => match stripe.retrieve_checkout_session(&session.id).await {
            Ok(full) => full.price_id().map(str::to_string),
            Err(e) => {
                log::warn!("price lookup failed session_id={}: {e}", session.id);
                None
            }
        },
        None => session.price_id().map(str::to_string),
    };

    let payment = ConfirmedPayment {
        email: &email,
        credits,
        checkout_id: &session.id,
        price_id: price_id.as_deref(),
    };
    match billing::record_payment(&state.pool, &payment).await {
        Ok(PaymentOutcome::Credited) | Ok(PaymentOutcome::AlreadyRecorded) => {
            HttpResponse::Ok().json(json!({ "received": true }))
        }
        Ok(PaymentOutcome::UnknownUser) => HttpResponse::Ok().json(json!({ "received": true, "ignored": true })),
        Err(e) => {
            log::error!("stripe webhook db error session_id={}: {e}", session.id);
            HttpResponse::InternalServerError().json(json!({ "error": "Webhook handler error" }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/stripe/webhook",
    tag = "webhooks",
    request_body(content = String, description = "Raw Stripe event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event received or ignored"),
        (status = 400, description = "Signature verification failed"),
        (status = 500, description = "Server error")
    )
)]
#[post("/stripe/webhook")]
pub async fn stripe_webhook(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    handle_stripe_webhook(req, body, state).await
}

#[utoipa::path(
    post,
    path = "/api/stripe/webhook",
    tag = "webhooks",
    request_body(content = String, description = "Raw Stripe event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event received or ignored"),
        (status = 400, description = "Signature verification failed"),
        (status = 500, description = "Server error")
    )
)]
#[post("/api/stripe/webhook")]
pub async fn stripe_webhook_alias(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    handle_stripe_webhook(req, body, state).await
}
