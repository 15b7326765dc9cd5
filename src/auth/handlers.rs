use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{error::AuthError, state::AppState, store::NewUser};

use super::{
    claims::TokenKind,
    dto::{
        ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
        TokenPair,
    },
    extractors::AuthUser,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    user::UserResponse,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/logout", post(logout))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_register(payload: &RegisterRequest) -> Result<(), AuthError> {
    if !is_valid_email(&payload.email) {
        return Err(AuthError::Validation("Invalid email address".into()));
    }
    let username_len = payload.username.chars().count();
    if !(3..=50).contains(&username_len) {
        return Err(AuthError::Validation(
            "Username must be 3 to 50 characters".into(),
        ));
    }
    validate_new_password(&payload.password)
}

fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 8 {
        return Err(AuthError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Authentication Microservice API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "register": "/api/v1/auth/register",
            "login": "/api/v1/auth/login",
            "refresh": "/api/v1/auth/refresh",
            "me": "/api/v1/auth/me",
            "change-password": "/api/v1/auth/change-password",
            "logout": "/api/v1/auth/logout"
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    validate_register(&payload)?;

    if state.store.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&payload.password)?;

    // A lost create race still surfaces as EmailTaken via the store's own check.
    let user = state
        .store
        .create(NewUser {
            email: payload.email,
            username: payload.username,
            password_hash: hash,
            full_name: payload.full_name,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    // Same error for unknown email and wrong password.
    let user = state
        .store
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| {
            warn!("login with unknown email");
            AuthError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AuthError::AccountDisabled);
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenPair::bearer(access_token, refresh_token)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(&payload.refresh_token, TokenKind::Refresh)?;

    // The account must still exist and be active. Deactivation is enforced
    // here, not on access tokens already in flight.
    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "refresh for missing or deactivated user");
            AuthError::InvalidToken
        })?;

    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;

    info!(user_id = %user.id, "token pair refreshed");
    Ok(Json(TokenPair::bearer(access_token, refresh_token)))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state
        .store
        .find_by_id(auth.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    validate_new_password(&payload.new_password)?;

    let user = state
        .store
        .find_by_id(auth.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with incorrect old password");
        return Err(AuthError::IncorrectPassword);
    }

    let new_hash = hash_password(&payload.new_password)?;
    state.store.update_password_hash(user.id, &new_hash).await?;

    // Outstanding tokens stay valid until their natural expiry; there is no
    // revocation state to update.
    info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse {
        message: "Password changed successfully".into(),
    }))
}

#[instrument]
pub async fn logout(auth: AuthUser) -> Json<MessageResponse> {
    // Stateless tokens: nothing to revoke server-side, the client discards
    // its copies.
    info!(user_id = %auth.user_id, "user logged out");
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}
