//! Error type definitions for the export pipeline.

use crate::core::config::ConfigError;
use thiserror::Error;

/// Enum representing the stage of the export pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred while normalizing image data.
    Normalization,
    /// Error occurred while resizing tensors.
    Resize,
    /// Error occurred while adapting raw model outputs.
    PostProcessing,
    /// Error occurred while tracing the adapted computation.
    Tracing,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Tracing => write!(f, "tracing"),
        }
    }
}

/// A plain message error used as the `source` of processing errors that
/// have no underlying cause.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct OpaqueError(pub String);

/// Errors that can occur while exporting a model.
///
/// The first four variants are the fatal precondition violations of the
/// export contract. None of them are retried and no partial artifact is ever
/// produced when one is returned.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The model does not belong to a supported trained-model family.
    #[error("Cannot convert unknown model type: {model_type}")]
    UnsupportedModelType {
        /// The model type reported by the model.
        model_type: String,
    },

    /// The model's source framework has no export path.
    #[error("Core ML export does not currently support {framework} models")]
    UnsupportedFramework {
        /// Name of the unsupported framework.
        framework: String,
    },

    /// The task identifier does not name any known output contract.
    #[error("Cannot compute outputs for unknown task '{task}'")]
    UnknownTask {
        /// The offending task identifier.
        task: String,
    },

    /// Neither supported source framework is available.
    #[error(
        "Cannot convert because neither PyTorch nor TensorFlow are available. \
         Enable a model backend first."
    )]
    MissingFrameworkDependency,

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The compile service rejected the request or produced an inconsistent artifact.
    #[error("compile: {message}")]
    Compile {
        /// A message describing the failure.
        message: String,
    },

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// JSON serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}
