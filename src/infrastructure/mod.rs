pub mod crypto;
pub mod database;
pub mod email;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmUserRepository};
pub use email::LogTransport;
pub use storage::InMemoryUserRepository;
