//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::services::AuthService;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::{auth, health, metrics};

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::handlers::health_check,
        // Auth
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::refresh_token,
        auth::handlers::confirm_email_code,
        auth::handlers::update_email_code,
    ),
    components(
        schemas(
            // Common
            crate::interfaces::http::common::EmptyData,
            // Auth
            auth::dto::RegisterRequest,
            auth::dto::LoginRequest,
            auth::dto::RefreshTokenRequest,
            auth::dto::ConfirmEmailCodeRequest,
            auth::dto::TokenPairResponse,
            auth::dto::LoginResponse,
            auth::dto::ConfirmEmailCodeResponse,
            // Health
            health::handlers::HealthResponse,
            health::handlers::ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login, email confirmation and token rotation"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

/// Build the full application router.
///
/// `db` is `None` when the in-memory repository backs the service; the
/// health endpoint then skips the database ping.
pub fn create_api_router(
    auth_service: Arc<AuthService>,
    jwt_config: JwtConfig,
    db: Option<DatabaseConnection>,
    prometheus_handle: PrometheusHandle,
) -> Router {
    let auth_state = AuthState { jwt: jwt_config };
    let handler_state = auth::AuthHandlerState { auth: auth_service };

    let open_routes = Router::new()
        .route("/register", post(auth::handlers::register))
        .route("/login", post(auth::handlers::login))
        .route("/refresh-token", post(auth::handlers::refresh_token))
        .with_state(handler_state.clone());

    // Confirmation endpoints identify the account from the verified token.
    let protected_routes = Router::new()
        .route(
            "/confirm-email-code",
            post(auth::handlers::confirm_email_code),
        )
        .route("/update-email-code", post(auth::handlers::update_email_code))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(handler_state);

    let health_router = Router::new()
        .route("/health", get(health::handlers::health_check))
        .with_state(health::HealthState {
            db,
            started_at: Arc::new(Instant::now()),
        });

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::prometheus_metrics))
        .with_state(metrics::MetricsState {
            handle: prometheus_handle,
        });

    Router::new()
        .nest("/api/v1/auth", open_routes.merge(protected_routes))
        .merge(health_router)
        .merge(metrics_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
