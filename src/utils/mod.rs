// src/utils/mod.rs
//! Common utilities: error types, configuration, shared HTTP client

pub mod config;
pub mod errors;
pub mod http;

pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use http::JsonClient;
