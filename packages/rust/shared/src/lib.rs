//! Shared types, error model, and configuration for CybVector.
//!
//! This crate is the foundation depended on by all other CybVector crates.
//! It provides:
//! - [`CybVectorError`]: the unified error type
//! - Domain types ([`SessionId`], [`ChatRequest`], [`ChatResponse`], [`Evidence`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, BackendStatus, CompletionConfig, Credentials, ReputationConfig,
    ServerConfig, SessionsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{CybVectorError, Result};
pub use types::{ChatRequest, ChatResponse, Evidence, EvidenceItem, SessionId};
