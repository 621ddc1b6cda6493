//! Shared types, error model, and configuration for factlearn.
//!
//! This crate is the foundation depended on by all other factlearn crates.
//! It provides:
//! - [`LearnError`] — the unified error type
//! - Domain types ([`Fact`], [`Relationship`], [`Ability`], [`Link`], [`Operation`])
//! - Configuration ([`AppConfig`], [`ParsersConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LearningConfig, ParsersConfig, PatternParserConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{LearnError, Result};
pub use types::{
    Ability, DEFAULT_EDGE, DEFAULT_FACT_SCORE, Fact, FactKey, FactRef, Link, LinkId, Operation,
    OperationId, Relationship, is_valid_trait,
};
