//! Shared types, error model, and configuration for ArtCallFinder.
//!
//! This crate is the foundation depended on by all other ArtCallFinder crates.
//! It provides:
//! - [`ArtCallError`]: the unified error type
//! - Domain types ([`Record`], [`PromptTemplates`])
//! - Configuration ([`AppConfig`], [`EnrichmentConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentConfig, OpenAiConfig, PathsConfig, ScrapeConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key,
};
pub use error::{ArtCallError, Result};
pub use types::{PromptTemplates, Record, build_prompt};
