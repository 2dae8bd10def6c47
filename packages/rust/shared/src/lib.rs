//! Shared types, error model, and configuration for relaybuild.
//!
//! This crate is the foundation depended on by all other relaybuild crates.
//! It provides:
//! - [`RelayError`] — the unified error type
//! - Domain types ([`Fragment`], [`Program`], [`FragmentSource`], [`AttemptId`])
//! - Configuration ([`AppConfig`], [`CompileConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompileConfig, ExecutionConfig, FetchConfig, FetchFailurePolicy, FragmentOrder,
    MarkerConfig, ServerConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{RelayError, Result};
pub use types::{AttemptId, CONFIG_FRAGMENT_NAME, Fragment, FragmentKind, FragmentSource, Program};
