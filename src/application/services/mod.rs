pub mod auth;
pub mod email_dispatcher;
pub mod tokens;

pub use auth::{AuthService, LoginOutcome};
pub use email_dispatcher::{DispatcherConfig, EmailDispatcher, EmailJob};
pub use tokens::{TokenIssuer, TokenPair};
