//! Ports — interfaces that decouple application services from transports

pub mod outbound;

pub use outbound::{EmailTransport, TransportError};
