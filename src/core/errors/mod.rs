//! Error types for the export pipeline.
//!
//! This module provides the error type shared by every stage of the export,
//! together with helper constructors that attach the failing stage and
//! context to an underlying cause.
//!
//! # Usage
//!
//! ```rust
//! use coreml_exporters::core::errors::{ExportError, ProcessingStage};
//!
//! let error = ExportError::tensor_operation(
//!     "Failed to reshape logits",
//!     std::io::Error::new(std::io::ErrorKind::InvalidData, "bad shape"),
//! );
//! assert!(matches!(
//!     error,
//!     ExportError::Processing { kind: ProcessingStage::TensorOperation, .. }
//! ));
//!
//! let unknown = ExportError::unknown_task("foo");
//! assert!(unknown.is_fatal_precondition());
//! ```

pub mod constructors;
pub mod types;

pub use types::{ExportError, OpaqueError, ProcessingStage};

/// Convenient result alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
