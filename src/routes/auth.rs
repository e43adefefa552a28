use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{credentials, session};
use crate::error::AppResult;
use crate::extractors::{session_token, CurrentUser};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let user_id = credentials::register(&state.db, &req.email, &req.username, &req.password)?;
    tracing::info!("Registered user {} ({})", req.username, user_id);
    Ok((StatusCode::CREATED, Json(json!({ "id": user_id }))).into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let user_id = credentials::authenticate(&state.db, &req.email, &req.password)?;
    let token = session::create_session(&state.db, user_id, state.config.auth.session_hours)?;

    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        state.config.auth.cookie_name,
        token,
        state.config.auth.session_hours * 3600
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "id": user_id })),
    )
        .into_response())
}

/// Revoke the session (if any) and clear the cookie. Always succeeds, so
/// a stale or missing cookie still logs the client out.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        session::revoke_session(&state.db, token)?;
    }

    let cookie = format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        state.config.auth.cookie_name
    );

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response())
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let user = credentials::get_user(&state.db, user.id)?;
    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "username": user.username,
        "created_at": user.created_at,
    }))
    .into_response())
}
