//! The core module of the export pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration and export options
//! - Error handling
//! - The op-translation registry
//! - Tensor types
//! - Traits for tasks and trained models
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod registry;
pub mod tensor;
pub mod traits;

pub use config::{ComputeUnit, ConfigError, ConfigValidator, ExportOptions, Quantize};
pub use errors::{ExportError, ExportResult, ProcessingStage};
pub use registry::{OpHandler, OpPatchSet, OpRegistry};
pub use tensor::Tensor;
pub use traits::{Modality, ModelConfig, ModelFramework, ModelKwargs, PretrainedModel, TaskType};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
