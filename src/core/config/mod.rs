//! Configuration management for the export pipeline.
//!
//! This module provides the export option types, validation traits, and the
//! `impl_config_validator!` helper used by configuration structs.

pub mod derive;
pub mod errors;
pub mod export;

pub use errors::{ConfigError, ConfigValidator};
pub use export::{ComputeUnit, ExportOptions, Quantize};
