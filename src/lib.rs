//! # Auth Service
//!
//! Identity, email-confirmation and token-rotation service.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Core business entities, the confirmation policy and the
//!   repository interface
//! - **application**: Business logic — the auth orchestrator, token issuer
//!   and email dispatch pipeline
//! - **infrastructure**: External concerns (database, crypto, mail transport)
//! - **interfaces**: REST API with Swagger documentation
//! - **support**: Error taxonomy and shutdown coordination

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod support;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};

// Re-export API router
pub use interfaces::http::create_api_router;
