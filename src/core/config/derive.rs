//! Utilities for ConfigValidator trait implementation.
//!
//! This module provides macros to make implementing ConfigValidator easier
//! and more consistent across configuration types.

/// Macro to implement ConfigValidator with basic validation patterns.
///
/// # Example
///
/// ```rust
/// use coreml_exporters::impl_config_validator;
///
/// #[derive(Debug, Clone)]
/// pub struct MyConfig {
///     pub sequence_length: usize,
/// }
///
/// impl_config_validator!(MyConfig {
///     sequence_length: min(1),
/// });
/// ```
#[macro_export]
macro_rules! impl_config_validator {
    ($type_name:ident { $($field:ident: $validator:ident $(($($args:tt)*))?),* $(,)? }) => {
        impl $crate::core::config::ConfigValidator for $type_name {
            fn validate(&self) -> Result<(), $crate::core::config::ConfigError> {
                $(
                    $crate::validate_field!(self, $field, $validator $(($($args)*))?);
                )*
                Ok(())
            }
        }
    };
}

/// Helper macro for field validation.
#[macro_export]
macro_rules! validate_field {
    ($self:expr, $field:ident, min($min_val:expr)) => {
        if $self.$field < $min_val {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!("{} must be at least {}", stringify!($field), $min_val),
            });
        }
    };
}
