//! Configuration loading, validation, and env substitution.
//!
//! Config files: `dray.toml`, `dray.yaml`, or `dray.json`
//! Searched in `./` then `~/.config/dray/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AppConfig, ChannelsConfig, DrayConfig, EmailChannelConfig, EmailProvider,
        TelegramChannelConfig, TemplatesConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
