//! Outbound ports — interfaces for delivering notifications to users
//!
//! [`EmailTransport`] is the contract between the email dispatcher and the
//! concrete mail delivery mechanism. The dispatcher imposes the send
//! deadline; implementations just attempt one delivery and report the
//! outcome. The development implementation lives in
//! [`LogTransport`](crate::infrastructure::email::LogTransport).

use async_trait::async_trait;
use thiserror::Error;

/// A single failed delivery attempt, as reported by a transport.
///
/// The dispatcher treats every transport error the same way (retry with
/// backoff), so one variant carrying the underlying description suffices.
#[derive(Debug, Error)]
#[error("email transport error: {0}")]
pub struct TransportError(pub String);

/// Port for sending a confirmation email to one recipient.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_confirmation(&self, recipient: &str, code: &str) -> Result<(), TransportError>;
}
