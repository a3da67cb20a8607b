pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod server;
pub mod token;
