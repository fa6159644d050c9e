//! Authentication API handlers
//!
//! Thin wrappers over [`AuthService`]; every branch of business logic lives
//! in the application layer.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::error;

use super::dto::{
    ConfirmEmailCodeRequest, ConfirmEmailCodeResponse, LoginRequest, LoginResponse,
    RefreshTokenRequest, RegisterRequest, TokenPairResponse,
};
use crate::application::services::AuthService;
use crate::infrastructure::crypto::jwt::ACCESS_TOKEN_TTL_SECS;
use crate::interfaces::http::common::{ApiResponse, EmptyData, ValidatedJson};
use crate::interfaces::http::middleware::AuthenticatedUser;
use crate::support::DomainError;

/// Auth handler state
#[derive(Clone)]
pub struct AuthHandlerState {
    pub auth: Arc<AuthService>,
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn error_reply<T>(err: DomainError) -> Reply<T> {
    let status = match &err {
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        // Storage details stay in the log.
        error!(error = %err, "request failed");
        return (status, Json(ApiResponse::error("internal error")));
    }

    (status, Json(ApiResponse::error(err.to_string())))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<TokenPairResponse>),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn register(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Reply<TokenPairResponse>, Reply<TokenPairResponse>> {
    let pair = state
        .auth
        .register(&request.email, &request.password, &request.name)
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TokenPairResponse::from(pair))),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, Reply<LoginResponse>> {
    let outcome = state
        .auth
        .login(&request.email, &request.password)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(LoginResponse {
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_TTL_SECS,
        email_confirmed: outcome.email_confirmed,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-token",
    tag = "Authentication",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = ApiResponse<TokenPairResponse>),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, Reply<TokenPairResponse>> {
    let pair = state
        .auth
        .refresh_token(&request.refresh_token)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(TokenPairResponse::from(pair))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/confirm-email-code",
    tag = "Authentication",
    request_body = ConfirmEmailCodeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Confirmation attempt result", body = ApiResponse<ConfirmEmailCodeResponse>),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Unknown account")
    )
)]
pub async fn confirm_email_code(
    State(state): State<AuthHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<ConfirmEmailCodeRequest>,
) -> Result<Json<ApiResponse<ConfirmEmailCodeResponse>>, Reply<ConfirmEmailCodeResponse>> {
    let confirmed = state
        .auth
        .confirm_email_code(&user.email, &request.code)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(ConfirmEmailCodeResponse {
        confirmed,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/update-email-code",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New confirmation code queued", body = ApiResponse<EmptyData>),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Unknown account"),
        (status = 429, description = "Resend requested inside the cooldown window")
    )
)]
pub async fn update_email_code(
    State(state): State<AuthHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<EmptyData>>, Reply<EmptyData>> {
    state
        .auth
        .resend_confirmation_code(&user.email)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(EmptyData {})))
}
