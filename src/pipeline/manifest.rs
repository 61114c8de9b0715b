//! A compile service that produces a package manifest.
//!
//! `ManifestCompiler` does not generate a weight graph. It derives the model
//! description from the traced signature and the declared inputs, lowers
//! every op the adapted computation uses through the supplied registry, and
//! records which handler each op went through.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::registry::{OpContext, OpRegistry};
use crate::models::{OutputTask, TracedModel};
use crate::pipeline::artifact::{
    CompiledArtifact, FeatureDescription, FeatureType, ModelDescription, ModelFormat,
    Precision, WeightPrecision,
};
use crate::pipeline::compile::{CompileRequest, CompileService};
use crate::processors::input_types::{ArrayDataType, InputSpec};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Name of the implicit probabilities output of a classifier.
pub const CLASSIFIER_PROBABILITIES_NAME: &str = "classLabel_probs";
/// Name of the implicit label output of a classifier.
pub const CLASSIFIER_LABEL_NAME: &str = "classLabel";

/// Reference compile service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCompiler;

impl ManifestCompiler {
    pub fn new() -> Self {
        Self
    }
}

/// Ops the adapted computation of a traced model lowers to.
fn adapter_ops(traced: &TracedModel<'_>) -> BTreeSet<&'static str> {
    let mut ops = BTreeSet::new();
    if traced.adapter().deferred_std().is_some() {
        ops.insert("div");
    }
    match traced.adapter().output_task() {
        OutputTask::Softmax { .. } | OutputTask::QuestionAnswering => {
            ops.insert("softmax");
        }
        OutputTask::SemanticSegmentation {
            do_upsample,
            do_argmax,
        } => {
            if do_upsample {
                ops.insert("upsample_bilinear2d");
            }
            if do_argmax {
                ops.insert("argmax");
            }
        }
        OutputTask::MaskedImage | OutputTask::ObjectDetection | OutputTask::Default { .. } => {}
    }
    ops
}

fn lower_ops(
    registry: &OpRegistry,
    names: impl IntoIterator<Item = String>,
    input_shapes: &[Vec<usize>],
) -> ExportResult<BTreeMap<String, String>> {
    let mut conversions = BTreeMap::new();
    for name in names {
        let handler = registry.get(&name).ok_or_else(|| {
            ExportError::compile_error(format!("no conversion registered for op '{name}'"))
        })?;
        let shape = handler.convert(&OpContext {
            op_name: &name,
            input_shapes,
        })?;
        debug!("Lowered '{}' with {} to shape {:?}", name, handler.label(), shape);
        conversions.insert(name, handler.label().to_string());
    }
    Ok(conversions)
}

fn input_feature(spec: &InputSpec) -> ExportResult<FeatureDescription> {
    let feature_type = match spec {
        InputSpec::Tensor { shape, dtype, .. } => FeatureType::MultiArray {
            shape: shape.clone(),
            data_type: *dtype,
        },
        InputSpec::Image {
            shape,
            color_layout,
            channel_first,
            ..
        } => {
            let (height, width) = match (shape.as_slice(), channel_first) {
                ([_, _, h, w], true) => (*h, *w),
                ([_, h, w, _], false) => (*h, *w),
                _ => {
                    return Err(ExportError::compile_error(format!(
                        "image input '{}' has shape {:?}",
                        spec.name(),
                        shape
                    )));
                }
            };
            FeatureType::Image {
                width,
                height,
                color_layout: *color_layout,
            }
        }
    };
    Ok(FeatureDescription::new(spec.name(), feature_type))
}

impl CompileService for ManifestCompiler {
    fn compile(&self, request: CompileRequest<'_>) -> ExportResult<CompiledArtifact> {
        let traced = request.traced;
        if request.inputs.len() != traced.input_shapes().len() {
            return Err(ExportError::compile_error(format!(
                "{} input spec(s) for a graph traced with {} input(s)",
                request.inputs.len(),
                traced.input_shapes().len()
            )));
        }
        for (spec, traced_shape) in request.inputs.iter().zip(traced.input_shapes()) {
            if spec.shape() != traced_shape.as_slice() {
                return Err(ExportError::compile_error(format!(
                    "input '{}' declared as {:?} but traced as {:?}",
                    spec.name(),
                    spec.shape(),
                    traced_shape
                )));
            }
        }

        let mut op_names: BTreeSet<String> =
            adapter_ops(traced).into_iter().map(String::from).collect();
        op_names.extend(request.patched_ops.iter().cloned());
        let op_conversions = lower_ops(request.op_registry, op_names, traced.input_shapes())?;

        let inputs = request
            .inputs
            .iter()
            .map(input_feature)
            .collect::<ExportResult<Vec<_>>>()?;

        let mut description = ModelDescription {
            inputs,
            ..ModelDescription::default()
        };
        let class_labels = match request.classifier {
            Some(classifier) => {
                if classifier.class_labels.is_empty() {
                    return Err(ExportError::compile_error("classifier has no class labels"));
                }
                description.outputs = vec![
                    FeatureDescription::new(CLASSIFIER_PROBABILITIES_NAME, FeatureType::Dictionary),
                    FeatureDescription::new(CLASSIFIER_LABEL_NAME, FeatureType::String),
                ];
                description.predicted_probabilities_name =
                    Some(CLASSIFIER_PROBABILITIES_NAME.to_string());
                description.predicted_feature_name = Some(CLASSIFIER_LABEL_NAME.to_string());
                Some(classifier.class_labels.clone())
            }
            None => {
                description.outputs = (0..traced.output_count())
                    .map(|i| {
                        FeatureDescription::new(
                            format!("var_{i}"),
                            FeatureType::MultiArray {
                                shape: Vec::new(),
                                data_type: ArrayDataType::Float32,
                            },
                        )
                    })
                    .collect();
                None
            }
        };

        let weight_precision = match request.precision {
            Some(Precision::Float16) => WeightPrecision::Float16,
            _ => WeightPrecision::Float32,
        };

        info!(
            "Compiled '{}' to {} with {} input(s) and {} output(s)",
            traced.task(),
            request.format.as_str(),
            description.inputs.len(),
            description.outputs.len()
        );

        Ok(CompiledArtifact {
            description,
            format: request.format,
            precision: request.precision,
            weight_precision,
            compute_units: request.compute_units,
            class_labels,
            op_conversions,
        })
    }

    fn reload(&self, artifact: CompiledArtifact) -> ExportResult<CompiledArtifact> {
        let description = &artifact.description;
        let mut seen = HashSet::new();
        for feature in description.inputs.iter().chain(&description.outputs) {
            if !seen.insert(feature.name.as_str()) {
                return Err(ExportError::compile_error(format!(
                    "feature name '{}' is used more than once",
                    feature.name
                )));
            }
        }
        for designated in [
            &description.predicted_probabilities_name,
            &description.predicted_feature_name,
        ]
        .into_iter()
        .flatten()
        {
            if description.output_named(designated).is_none() {
                return Err(ExportError::compile_error(format!(
                    "classifier output '{designated}' does not exist"
                )));
            }
        }
        Ok(artifact)
    }

    fn quantize_weights(
        &self,
        mut artifact: CompiledArtifact,
        nbits: u8,
    ) -> ExportResult<CompiledArtifact> {
        if artifact.format != ModelFormat::NeuralNetwork {
            return Err(ExportError::compile_error(
                "weight quantization applies to neuralnetwork models only",
            ));
        }
        artifact.weight_precision = match nbits {
            16 => WeightPrecision::Float16,
            32 => WeightPrecision::Float32,
            other => {
                return Err(ExportError::compile_error(format!(
                    "unsupported weight quantization to {other} bits"
                )));
            }
        };
        info!("Quantized weights to {} bits", nbits);
        Ok(artifact)
    }
}
