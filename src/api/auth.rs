// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, post, web, Error, HttpMessage, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::{billing, db, AppState};

pub const SESSION_COOKIE: &str = "session";
const SESSION_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// The caller resolved from the session token. Absent for guests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub ok: bool,
    pub email: String,
    pub token: String,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn require_login(identity: Option<web::ReqData<Identity>>) -> Result<String, ApiError> {
    identity
        .map(|i| i.into_inner().email)
        .ok_or(ApiError::Unauthorized)
}

pub fn issue_token(secret: &str, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: email.to_string(),
        exp: (Utc::now() + Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

fn decode_token(secret: &str, token: &str) -> Option<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(SESSION_DAYS))
        .finish()
}

fn credentials(payload: CredentialsRequest) -> Result<(String, String), ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password required".to_string()));
    }
    Ok((email, payload.password))
}

fn signed_in(state: &AppState, email: String) -> Result<HttpResponse, ApiError> {
    let token = issue_token(&state.config.session_secret, &email).map_err(|e| {
        log::error!("jwt encode error: {e}");
        ApiError::Internal(e.to_string())
    })?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token.clone()))
        .json(AuthResponse {
            ok: true,
            email,
            token,
        }))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Missing fields or email already registered")
    )
)]
#[post("/auth/signup")]
pub async fn signup(
    state: web::Data<AppState>,
    payload: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, ApiError> {
    let (email, password) = credentials(payload.into_inner())?;

    if db::find_user(&state.pool, &email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let cost = state.config.bcrypt_cost;
    let password_hash = web::block(move || hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            log::error!("bcrypt hash error: {e}");
            ApiError::Internal(e.to_string())
        })?;

    let user = db::create_user(&state.pool, &email, &password_hash, state.config.free_credits_email).await?;
    log::info!("user signed up user={} credits={}", user.email, user.credits);

    signed_in(&state, user.email)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, ApiError> {
    let (email, password) = credentials(payload.into_inner())?;

    let Some(password_hash) = db::find_password_hash(&state.pool, &email).await? else {
        return Err(ApiError::InvalidCredentials);
    };

    let valid = web::block(move || verify(password, &password_hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            log::error!("bcrypt verify error: {e}");
            ApiError::Internal(e.to_string())
        })?;
    if !valid {
        log::warn!("failed login user={email}");
        return Err(ApiError::InvalidCredentials);
    }

    db::touch_last_login(&state.pool, &email).await?;
    signed_in(&state, email)
}

#[utoipa::path(post, path = "/auth/logout", tag = "auth", responses((status = 200, description = "Session cookie cleared")))]
#[post("/auth/logout")]
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Ok().cookie(cookie).json(json!({ "ok": true }))
}

#[utoipa::path(get, path = "/me", tag = "auth", responses((status = 200, description = "Identity, balance and plan")))]
#[get("/me")]
pub async fn me(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let Some(identity) = identity else {
        return Ok(HttpResponse::Ok().json(json!({
            "email": null,
            "credits": null,
            "subscription": null,
            "guest_credits": state.config.free_credits_guest,
        })));
    };

    let email = identity.into_inner().email;
    let balance = billing::get_balance(&state.pool, Some(&email)).await?.unwrap_or(0);
    let subscription = db::get_or_create_subscription(&state.pool, &email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "email": email,
        "credits": balance,
        "subscription": subscription,
    })))
}

#[utoipa::path(get, path = "/credits", tag = "auth", responses((status = 200, description = "Current balance, null for guests")))]
#[get("/credits")]
pub async fn credits(
    state: web::Data<AppState>,
    identity: Option<web::ReqData<Identity>>,
) -> Result<HttpResponse, ApiError> {
    let email = identity.map(|i| i.into_inner().email);
    let balance = billing::get_balance(&state.pool, email.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "credits": balance })))
}

/// Resolves the session cookie or `Authorization: Bearer <jwt>` into an
/// [`Identity`] request extension. Requests without a valid token pass
/// through as guests; handlers decide whether a login is required.
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareInner { service }))
    }
}

pub struct SessionMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
            .or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()));

        let secret = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.session_secret.clone());

        if let (Some(token), Some(secret)) = (token, secret) {
            if let Some(email) = decode_token(&secret, &token) {
                req.extensions_mut().insert(Identity { email });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
