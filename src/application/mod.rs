pub mod ports;
pub mod services;

pub use ports::{EmailTransport, TransportError};
pub use services::{
    AuthService, DispatcherConfig, EmailDispatcher, LoginOutcome, TokenIssuer, TokenPair,
};
