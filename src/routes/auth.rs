use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult, ErrorKind},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::invalid_input("username and password are required"));
    }

    let identity = state
        .credentials
        .verify(&payload.username, &payload.password)?
        .ok_or_else(|| AppError::new(ErrorKind::TokenInvalid, "invalid credentials"))?;

    let access_token = state
        .jwt
        .issue(identity.id, &identity.username, &identity.role)
        .map_err(AppError::from)?;

    info!(username = %identity.username, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
