use crate::{
    auth::{AuthUser, ChangePasswordRequest, LoginCredentials, TokenResponse, UserProfile},
    handlers::{
        common::{success_response, validate_input},
        AppState,
    },
};
use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use tracing::info;

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/api/Auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 400, description = "Malformed credentials"),
        (status = 401, description = "Wrong email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> Result<Response, Response> {
    validate_input(&payload).map_err(IntoResponse::into_response)?;

    let token = state
        .auth
        .login(&payload)
        .await
        .map_err(IntoResponse::into_response)?;

    info!(user_id = %token.user.id, role = ?token.user.role, "User logged in");
    Ok(success_response(token))
}

/// Profile of the token's bearer
#[utoipa::path(
    get,
    path = "/api/Auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Response, Response> {
    let profile = state
        .auth
        .profile(&user)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(success_response(profile))
}

#[utoipa::path(
    post,
    path = "/api/Auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password incorrect or new password invalid"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, Response> {
    validate_input(&payload).map_err(IntoResponse::into_response)?;

    state
        .auth
        .change_password(&user, &payload)
        .await
        .map_err(IntoResponse::into_response)?;

    info!(user_id = %user.user_id, "Password changed");
    Ok(success_response(serde_json::json!({
        "message": "Password changed successfully"
    })))
}
