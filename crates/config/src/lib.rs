//! Configuration loading, env substitution, and validation.
//!
//! Config files: `handoff.toml`, `handoff.yaml`, or `handoff.json`
//! Searched in `./` then `~/.config/handoff/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_config_file, load_config,
        set_config_dir,
    },
    schema::{
        AdminConfig, AssistantConfig, DatabaseConfig, HandoffConfig, MetaConfig, MetricsConfig,
        RepliesConfig, RoutingConfig, SentimentConfig, ServerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
