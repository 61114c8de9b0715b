//! Export orchestration.
//!
//! [`export`] drives a whole export: model overrides, dummy inputs, the
//! adapted and traced computation, input synthesis, the compile call and the
//! post-processing of the compiled description. The exporter for the
//! model's framework is resolved once, before any of that starts.

use crate::core::config::ExportOptions;
use crate::core::errors::{ExportError, ExportResult};
use crate::core::registry::global_op_registry_snapshot;
use crate::core::traits::{ModelFramework, PretrainedModel, TaskType};
use crate::domain::preprocessor::Preprocessor;
use crate::domain::tasks::TaskConfiguration;
use crate::models::{OutputAdapter, TracedModel};
use crate::pipeline::artifact::{CompiledArtifact, ModelFormat, Precision};
use crate::pipeline::compile::{ClassifierConfig, CompileRequest, CompileService};
use crate::processors::input_types::synthesize_input_types;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Metadata key carrying the library version the weights were saved with.
pub const TRANSFORMERS_VERSION_KEY: &str = "transformers_version";
/// Metadata key carrying the comma-joined class labels.
pub const CLASSES_KEY: &str = "classes";
/// Metadata key selecting the preview tool for the model.
pub const PREVIEW_TYPE_KEY: &str = "com.apple.coreml.model.preview.type";
/// Metadata key carrying the preview tool parameters.
pub const PREVIEW_PARAMS_KEY: &str = "com.apple.coreml.model.preview.params";

/// Which model frameworks are usable in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkAvailability {
    pub pytorch: bool,
    pub tensorflow: bool,
}

impl Default for FrameworkAvailability {
    fn default() -> Self {
        Self {
            pytorch: true,
            tensorflow: true,
        }
    }
}

impl FrameworkAvailability {
    /// No framework available.
    pub fn none() -> Self {
        Self {
            pytorch: false,
            tensorflow: false,
        }
    }
}

/// An export path for one model framework.
pub trait ModelExporter {
    /// Name of the framework this exporter handles.
    fn framework(&self) -> ModelFramework;

    /// Exports `model` into a compiled artifact.
    fn export(
        &self,
        preprocessor: &Preprocessor,
        model: &mut dyn PretrainedModel,
        config: &TaskConfiguration,
        options: &ExportOptions,
        service: &dyn CompileService,
    ) -> ExportResult<CompiledArtifact>;
}

/// Exports PyTorch-family models.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyTorchExporter;

/// A framework with no export path. Every export fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedExporter {
    framework: ModelFramework,
}

impl UnsupportedExporter {
    pub fn new(framework: ModelFramework) -> Self {
        Self { framework }
    }
}

impl ModelExporter for UnsupportedExporter {
    fn framework(&self) -> ModelFramework {
        self.framework.clone()
    }

    fn export(
        &self,
        _preprocessor: &Preprocessor,
        _model: &mut dyn PretrainedModel,
        _config: &TaskConfiguration,
        _options: &ExportOptions,
        _service: &dyn CompileService,
    ) -> ExportResult<CompiledArtifact> {
        Err(ExportError::UnsupportedFramework {
            framework: self.framework.to_string(),
        })
    }
}

/// Picks the exporter for a model.
///
/// # Errors
///
/// * `MissingFrameworkDependency` when no framework is available at all.
/// * `UnsupportedModelType` when the model's framework is unknown or not
///   available.
pub fn resolve_exporter(
    model: &dyn PretrainedModel,
    availability: FrameworkAvailability,
) -> ExportResult<Box<dyn ModelExporter>> {
    if !(availability.pytorch || availability.tensorflow) {
        return Err(ExportError::MissingFrameworkDependency);
    }

    match model.framework() {
        ModelFramework::PyTorch if availability.pytorch => Ok(Box::new(PyTorchExporter)),
        ModelFramework::TensorFlow if availability.tensorflow => Ok(Box::new(
            UnsupportedExporter::new(ModelFramework::TensorFlow),
        )),
        _ => Err(ExportError::unsupported_model_type(
            model.config().model_type.clone(),
        )),
    }
}

/// Exports a model with every framework considered available.
pub fn export(
    preprocessor: &Preprocessor,
    model: &mut dyn PretrainedModel,
    config: &TaskConfiguration,
    options: &ExportOptions,
    service: &dyn CompileService,
) -> ExportResult<CompiledArtifact> {
    export_with_frameworks(
        preprocessor,
        model,
        config,
        options,
        service,
        FrameworkAvailability::default(),
    )
}

/// Exports a model given which frameworks are available.
pub fn export_with_frameworks(
    preprocessor: &Preprocessor,
    model: &mut dyn PretrainedModel,
    config: &TaskConfiguration,
    options: &ExportOptions,
    service: &dyn CompileService,
    availability: FrameworkAvailability,
) -> ExportResult<CompiledArtifact> {
    let exporter = resolve_exporter(model, availability)?;
    exporter.export(preprocessor, model, config, options, service)
}

/// Labels of the classifier designation, if the task has one.
fn classifier_labels(task: TaskType, model: &dyn PretrainedModel) -> ExportResult<Option<Vec<String>>> {
    match task {
        TaskType::ImageClassification
        | TaskType::MultipleChoice
        | TaskType::SequenceClassification => Ok(Some(model.config().class_labels()?)),
        TaskType::NextSentencePrediction => Ok(Some(vec!["true".into(), "false".into()])),
        _ => Ok(None),
    }
}

fn apply_overrides(model: &mut dyn PretrainedModel, config: &TaskConfiguration) -> ExportResult<()> {
    let Some(overrides) = &config.values_override else {
        return Ok(());
    };
    info!("Overriding {} configuration item(s)", overrides.len());
    for (key, value) in overrides {
        info!("\t- {} -> {}", key, value);
        model.config_mut().set_attribute(key, value.clone())?;
    }
    Ok(())
}

impl ModelExporter for PyTorchExporter {
    fn framework(&self) -> ModelFramework {
        ModelFramework::PyTorch
    }

    fn export(
        &self,
        preprocessor: &Preprocessor,
        model: &mut dyn PretrainedModel,
        config: &TaskConfiguration,
        options: &ExportOptions,
        service: &dyn CompileService,
    ) -> ExportResult<CompiledArtifact> {
        let task = config.validate()?;
        info!(
            "Exporting {} model for '{}' with framework PyTorch",
            model.config().model_type,
            task
        );

        apply_overrides(model, config)?;
        let model: &dyn PretrainedModel = model;

        let dummy_inputs = config.generate_dummy_inputs(preprocessor)?;
        let example_inputs = dummy_inputs.ordered_for(&config.inputs)?;

        let adapter = OutputAdapter::new(preprocessor, model, config)?;
        adapter.forward(&example_inputs)?;
        let traced = TracedModel::trace(adapter, &example_inputs)?;
        let example_outputs = traced.run(&example_inputs)?;

        let classifier = classifier_labels(task, model)?.map(ClassifierConfig::new);

        let base_registry = global_op_registry_snapshot()?;
        let (op_registry, patched_ops) = match &config.patched_ops {
            Some(patches) => (
                base_registry.patched(patches),
                patches.iter().map(|(name, _)| name.clone()).collect(),
            ),
            None => (base_registry, Vec::new()),
        };

        let input_specs = synthesize_input_types(preprocessor, config, &dummy_inputs)?;

        let (format, precision) = if options.legacy {
            (ModelFormat::NeuralNetwork, None)
        } else if options.compile_in_float16() {
            (ModelFormat::MlProgram, Some(Precision::Float16))
        } else {
            (ModelFormat::MlProgram, Some(Precision::Float32))
        };

        let mut artifact = service.compile(CompileRequest {
            traced: &traced,
            inputs: &input_specs,
            format,
            precision,
            compute_units: options.compute_units,
            classifier: classifier.as_ref(),
            op_registry: &op_registry,
            patched_ops,
        })?;

        let description = &mut artifact.description;
        for input in &config.inputs {
            description.set_input_description(&input.name, &input.description);
        }

        let mut user_defined = BTreeMap::new();
        if let Some(version) = &model.config().transformers_version {
            user_defined.insert(TRANSFORMERS_VERSION_KEY.to_string(), version.clone());
        }

        let mut outputs = config.output_cursor();
        if task.is_classifier() {
            let probabilities = outputs.next().ok_or_else(|| {
                ExportError::invalid_input("classifier declares no probabilities output")
            })?;
            let compiled = description.predicted_probabilities_name.clone().ok_or_else(|| {
                ExportError::compile_error("compiled classifier has no probabilities output")
            })?;
            description.rename_feature(&compiled, &probabilities.name);
            description.predicted_probabilities_name = Some(probabilities.name.clone());
            description.set_output_description(&probabilities.name, &probabilities.description);

            let label = outputs.next().ok_or_else(|| {
                ExportError::invalid_input("classifier declares no label output")
            })?;
            let compiled = description.predicted_feature_name.clone().ok_or_else(|| {
                ExportError::compile_error("compiled classifier has no label output")
            })?;
            description.rename_feature(&compiled, &label.name);
            description.predicted_feature_name = Some(label.name.clone());
            description.set_output_description(&label.name, &label.description);
        } else {
            for (i, (output, observed)) in outputs.zip(&example_outputs).enumerate() {
                let compiled = description.outputs.get_mut(i).ok_or_else(|| {
                    ExportError::compile_error(format!("compiled model has no output {i}"))
                })?;
                let compiled_name = compiled.name.clone();
                compiled.set_multiarray_shape(observed.shape());
                description.rename_feature(&compiled_name, &output.name);
                description.set_output_description(&output.name, &output.description);
            }

            if task.publishes_class_list() {
                let labels = model.config().labels_as_list();
                user_defined.insert(CLASSES_KEY.to_string(), labels.join(","));

                if task == TaskType::SemanticSegmentation {
                    user_defined.insert(PREVIEW_TYPE_KEY.to_string(), "imageSegmenter".to_string());
                    user_defined.insert(
                        PREVIEW_PARAMS_KEY.to_string(),
                        serde_json::to_string(&serde_json::json!({ "labels": labels }))?,
                    );
                }
            }
        }

        if !user_defined.is_empty() {
            debug!("Attaching {} metadata item(s)", user_defined.len());
            description.user_defined.extend(user_defined);
        }

        let mut artifact = service.reload(artifact)?;
        if options.quantize_after_compile() {
            artifact = service.quantize_weights(artifact, 16)?;
        }
        Ok(artifact)
    }
}
