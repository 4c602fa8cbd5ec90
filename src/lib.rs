pub mod app;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod permissions;
pub mod repository;
pub mod sanitize;
pub mod schema;
pub mod services;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod testing;
