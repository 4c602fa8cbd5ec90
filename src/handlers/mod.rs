// handlers/mod.rs - one module per resource, plus shared extractors
pub mod config;
pub mod databases;
pub mod files;
pub mod params;
pub mod records;
pub mod system;

pub use params::{JsonObject, ListQuery};
