//! Login sessions and the authentication middleware
//!
//! Clients log in with a username and password and receive a session token,
//! then send `Authorization: Bearer <token>` on every protected request.
//! `viewer` accounts are read-only.

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use condo_common::db::users::{self, User, UserRole};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::AppState;

/// Identity attached to each authenticated request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// `None` when authentication is disabled
    pub user: Option<User>,
    pub role: UserRole,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub username: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: Option<String>,
    pub role: UserRole,
    pub auth_enabled: bool,
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Requests a read-only account may make
fn allowed_for_viewer(request: &Request) -> bool {
    matches!(*request.method(), Method::GET | Method::HEAD)
        || request.uri().path() == "/api/auth/logout"
}

/// Authentication middleware
///
/// Applied to protected routes only. When auth is disabled every request
/// passes through as an implicit admin.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.auth.enabled {
        request.extensions_mut().insert(CurrentUser {
            user: None,
            role: UserRole::Admin,
            token: None,
        });
        return Ok(next.run(request).await);
    }

    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    let user = users::session_user(&state.db, &token).await?;

    if !user.role.can_write() && !allowed_for_viewer(&request) {
        warn!(
            "Rejected {} {} for read-only user '{}'",
            request.method(),
            request.uri().path(),
            user.username
        );
        return Err(ApiError::Forbidden(format!(
            "User '{}' has read-only access",
            user.username
        )));
    }

    request.extensions_mut().insert(CurrentUser {
        role: user.role,
        user: Some(user),
        token: Some(token),
    });
    Ok(next.run(request).await)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = match users::authenticate(&state.db, &body.username, &body.password).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Failed login for '{}'", body.username.trim());
            return Err(e.into());
        }
    };
    let session = users::create_session(&state.db, user.guid, state.auth.session_ttl_hours).await?;
    info!("User '{}' logged in", user.username);

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        username: user.username,
        role: user.role,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    if let Some(token) = &current.token {
        users::delete_session(&state.db, token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Json<MeResponse> {
    Json(MeResponse {
        username: current.user.map(|u| u.username),
        role: current.role,
        auth_enabled: state.auth.enabled,
    })
}
