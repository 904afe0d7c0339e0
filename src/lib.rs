pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod registry;
pub mod server;
pub mod services;
pub mod types;

// In-memory seams shared by unit tests and tests/
pub mod testing;
