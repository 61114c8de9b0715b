//! Error constructor utilities for the export pipeline.
//!
//! Helper functions for creating `ExportError` values with the right
//! processing stage and context attached.

use crate::core::config::ConfigError;
use super::types::{ExportError, OpaqueError, ProcessingStage};

impl ExportError {
    /// Internal helper to build a Processing error with minimal boilerplate.
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an ExportError for tensor operations.
    ///
    /// # Arguments
    ///
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates an ExportError for normalization operations.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Normalization, context, error)
    }

    /// Creates an ExportError for resize operations.
    pub fn resize_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::processing_with_context(ProcessingStage::Resize, message.clone(), OpaqueError(message))
    }

    /// Creates an ExportError for output adaptation failures.
    ///
    /// Used when a raw model produced fewer outputs than the task contract
    /// needs, or an output has a shape the task cannot handle.
    pub fn post_processing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::processing_with_context(
            ProcessingStage::PostProcessing,
            message.clone(),
            OpaqueError(message),
        )
    }

    /// Creates an ExportError for a traced execution that diverged from the
    /// recorded graph signature.
    pub fn tracing_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::processing_with_context(ProcessingStage::Tracing, message.clone(), OpaqueError(message))
    }

    /// Creates an ExportError for an unknown task identifier.
    pub fn unknown_task(task: impl Into<String>) -> Self {
        Self::UnknownTask { task: task.into() }
    }

    /// Creates an ExportError for a model outside the supported families.
    pub fn unsupported_model_type(model_type: impl Into<String>) -> Self {
        Self::UnsupportedModelType {
            model_type: model_type.into(),
        }
    }

    /// Creates an ExportError indicating invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an ExportError for an invalid configuration value.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::InvalidConfig {
            message: message.into(),
        })
    }

    /// Creates an ExportError reported by the compile service.
    pub fn compile_error(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    /// Returns true for the non-recoverable precondition violations:
    /// unsupported model type, unsupported framework, unknown task and a
    /// missing framework dependency.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedModelType { .. }
                | Self::UnsupportedFramework { .. }
                | Self::UnknownTask { .. }
                | Self::MissingFrameworkDependency
        )
    }
}
