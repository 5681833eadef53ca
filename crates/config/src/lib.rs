//! Configuration loading, validation, env substitution, and atomic saving.
//!
//! Config files: `chatbridge.toml`, `chatbridge.yaml`, or `chatbridge.json`.
//! Searched in `./` then in the user config directory (`~/.config/chatbridge/`).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_config_path, load_config,
        parse_config, require_config_path, save_config, update_config_value,
    },
    schema::{BotConfig, ChatDefaults, DispatchConfig, ImageConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
