//! The compile service seam.
//!
//! A compile service lowers a traced model and its input specs into a
//! [`CompiledArtifact`]. The op registry it lowers with is passed in the
//! request, already patched for the export at hand.

use crate::core::config::ComputeUnit;
use crate::core::errors::ExportResult;
use crate::core::registry::OpRegistry;
use crate::models::TracedModel;
use crate::pipeline::artifact::{CompiledArtifact, ModelFormat, Precision};
use crate::processors::input_types::InputSpec;

/// Labels that turn the compiled model into a classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub class_labels: Vec<String>,
}

impl ClassifierConfig {
    pub fn new(class_labels: Vec<String>) -> Self {
        Self { class_labels }
    }
}

/// Everything a compile call needs.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// The traced computation
    pub traced: &'a TracedModel<'a>,
    /// Declared inputs in positional order
    pub inputs: &'a [InputSpec],
    pub format: ModelFormat,
    /// Compute precision; `None` lets the service pick its format default
    pub precision: Option<Precision>,
    pub compute_units: ComputeUnit,
    /// Present for classifier tasks
    pub classifier: Option<&'a ClassifierConfig>,
    /// Op registry snapshot to lower with
    pub op_registry: &'a OpRegistry,
    /// Op names whose handlers were patched for this export
    pub patched_ops: Vec<String>,
}

/// A backend that turns traced models into compiled artifacts.
pub trait CompileService {
    /// Compiles a traced model.
    fn compile(&self, request: CompileRequest<'_>) -> ExportResult<CompiledArtifact>;

    /// Re-validates an artifact after its description was edited.
    fn reload(&self, artifact: CompiledArtifact) -> ExportResult<CompiledArtifact> {
        Ok(artifact)
    }

    /// Quantizes the weights of a legacy-format artifact to `nbits`.
    fn quantize_weights(
        &self,
        artifact: CompiledArtifact,
        nbits: u8,
    ) -> ExportResult<CompiledArtifact>;
}
