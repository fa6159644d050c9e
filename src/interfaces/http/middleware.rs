//! Authentication middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::infrastructure::crypto::jwt::{verify_token, JwtConfig, TokenClaims};
use crate::interfaces::http::common::{ApiResponse, EmptyData};

/// Authentication state for the middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtConfig,
}

/// Identity extracted from a verified bearer token.
///
/// The confirmation endpoints act on `email`, so a client can only ever
/// confirm or reissue codes for the address its token was minted for.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<EmptyData>::error(message)),
    )
        .into_response()
}

/// Bearer-JWT authentication middleware
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer);

    let Some(token) = token else {
        return unauthorized("Missing authentication token");
    };

    match verify_token(token, &state.jwt) {
        Ok(claims) => {
            if claims.is_expired() {
                return unauthorized("Token has expired");
            }
            request
                .extensions_mut()
                .insert(AuthenticatedUser::from_claims(claims));
            next.run(request).await
        }
        Err(_) => unauthorized("Invalid authentication token"),
    }
}
