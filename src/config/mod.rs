//! Configuration module for Lupin.
//!
//! This module wires together the data models, the validation contract and the
//! persistence helpers. Import from here for a convenient, stable API.
//!
//! Example:
//! use lupin::config::{ConfigDraft, validate_config};
//!
//! let cfg = validate_config(&ConfigDraft::default())?;

pub mod loader;
pub mod models;
pub mod validate;

// Re-export core data models
pub use models::{Config, ConfigDraft, RestartPolicy};

// Re-export validation
pub use validate::{InvalidConfig, MAX_INTERVAL_CEILING_MS, MIN_INTERVAL_FLOOR_MS, validate_config};

// Re-export loader utilities
pub use loader::{
    ConfigStore, generate_schema, load_from_path_async, load_from_reader, load_from_str,
    write_schema_to_writer,
};
