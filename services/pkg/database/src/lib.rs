pub mod config;
pub mod connect;

pub use config::PGConfig;
pub use connect::connect;
