//! Email transport implementations
//!
//! The production delivery mechanism is deliberately pluggable behind
//! [`EmailTransport`]; this module ships the structured-log sender used for
//! local development, where the code lands in the service log instead of an
//! inbox.

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::{EmailTransport, TransportError};

/// Development sender that logs the message instead of delivering it.
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send_confirmation(&self, recipient: &str, code: &str) -> Result<(), TransportError> {
        info!(recipient, code, "confirmation email (log transport)");
        Ok(())
    }
}
