//! # Core ML Exporters
//!
//! Export trained transformer models into task-annotated Core ML packages.
//!
//! An export wraps a raw model in an output adapter for its task, traces the
//! adapted computation on dummy inputs, synthesizes the input signature from
//! the preprocessor, and hands both to a compile service. The compiled
//! description is then renamed, annotated and optionally quantized.
//!
//! ## Supported tasks
//!
//! - **Text**: default, masked-lm, multiple-choice, next-sentence-prediction,
//!   question-answering, sequence-classification, token-classification
//! - **Vision**: default, image-classification, masked-im, object-detection,
//!   semantic-segmentation
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, the op-translation registry and model traits
//! * [`domain`] - Descriptors, preprocessors and task configurations
//! * [`models`] - The output adapter and its traced form
//! * [`pipeline`] - Export orchestration and the compile service seam
//! * [`processors`] - Input synthesis, normalization and tensor ops
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coreml_exporters::prelude::*;
//!
//! # fn run(model: &mut dyn PretrainedModel) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TaskConfiguration::from_json_str(r#"
//! {
//!   "modality": "text",
//!   "task": "sequence-classification",
//!   "inputs": [
//!     { "name": "input_ids", "description": "Indices of input sequence tokens" },
//!     { "name": "attention_mask", "description": "Mask to avoid padding tokens" }
//!   ],
//!   "outputs": [
//!     { "name": "probabilities", "description": "Probability of each category" },
//!     { "name": "classLabel", "description": "Category with the highest score" }
//!   ]
//! }
//! "#)?;
//!
//! let preprocessor = Preprocessor::Tokenizer(TokenizerInfo::default());
//! let options = ExportOptions::new().with_quantize("float16".parse()?);
//!
//! let artifact = export(&preprocessor, model, &config, &options, &ManifestCompiler)?;
//! artifact.save("SentimentClassifier.mlpackage")?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod processors;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports.
///
/// ```rust
/// use coreml_exporters::prelude::*;
/// ```
///
/// Included items cover a typical export:
/// - Entry point and compile services (`export`, `CompileService`, `ManifestCompiler`)
/// - Configuration (`TaskConfiguration`, `ExportOptions`, `Quantize`, `ComputeUnit`)
/// - Preprocessors and descriptors
/// - The model seam (`PretrainedModel`, `ModelConfig`)
/// - Error and result types (`ExportError`, `ExportResult`)
pub mod prelude {
    pub use crate::core::{
        ComputeUnit, ExportError, ExportOptions, ExportResult, ModelConfig, ModelFramework,
        ModelKwargs, PretrainedModel, Quantize, TaskType, Tensor, init_tracing,
    };
    pub use crate::domain::{
        ColorLayout, FeatureExtractorInfo, ImageSize, InputDescriptor, OutputDescriptor,
        Preprocessor, TaskConfiguration, TokenizerInfo,
    };
    pub use crate::pipeline::{
        CompileService, CompiledArtifact, ManifestCompiler, export, export_with_frameworks,
    };
}
