//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration validation.
///
/// Raised when option strings fail to parse and when dummy-input parameters
/// fail validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implemented by the parameter structs of the export pipeline, usually
/// through [`impl_config_validator!`](crate::impl_config_validator).
pub trait ConfigValidator {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// A Result indicating success or a ConfigError if validation fails.
    fn validate(&self) -> Result<(), ConfigError>;
}
