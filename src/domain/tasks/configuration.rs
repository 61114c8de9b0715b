//! Task configuration: what an exported model takes and returns.
//!
//! A configuration pairs a modality and task identifier with the ordered
//! input and output descriptors, optional overrides for the model's own
//! configuration, and optional op-conversion patches.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::registry::{OpHandler, OpPatchSet};
use crate::core::traits::{Modality, TaskType};
use crate::domain::descriptors::{DescriptorCursor, InputDescriptor, OutputDescriptor};
use crate::domain::tasks::dummy_inputs::DummyInputOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Declarative description of an export target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfiguration {
    /// Input modality
    pub modality: Modality,
    /// Task identifier, resolved to a [`TaskType`] when the adapter is built
    pub task: String,
    /// Inputs in positional order
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
    /// Outputs in positional order
    #[serde(default)]
    pub outputs: Vec<OutputDescriptor>,
    /// Values written onto the model configuration before tracing
    #[serde(default)]
    pub values_override: Option<Map<String, Value>>,
    /// Parameters of the dummy inputs used for tracing
    #[serde(default)]
    pub dummy_inputs: DummyInputOptions,
    /// Op-conversion patches applied for the duration of the compile call
    #[serde(skip)]
    pub patched_ops: Option<OpPatchSet>,
}

impl TaskConfiguration {
    /// Creates an empty configuration for a modality and task identifier.
    pub fn new(modality: Modality, task: impl Into<String>) -> Self {
        Self {
            modality,
            task: task.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            values_override: None,
            dummy_inputs: DummyInputOptions::default(),
            patched_ops: None,
        }
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> ExportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ExportResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Appends an input descriptor.
    pub fn with_input(mut self, input: InputDescriptor) -> Self {
        self.inputs.push(input);
        self
    }

    /// Appends an output descriptor.
    pub fn with_output(mut self, output: OutputDescriptor) -> Self {
        self.outputs.push(output);
        self
    }

    /// Adds a model configuration override.
    pub fn with_override(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values_override
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    /// Adds an op-conversion patch.
    pub fn with_patched_op(mut self, name: impl Into<String>, handler: OpHandler) -> Self {
        self.patched_ops
            .get_or_insert_with(Vec::new)
            .push((name.into(), handler));
        self
    }

    /// Sets the dummy-input parameters.
    pub fn with_dummy_inputs(mut self, options: DummyInputOptions) -> Self {
        self.dummy_inputs = options;
        self
    }

    /// Resolves the task identifier.
    ///
    /// # Errors
    ///
    /// `ExportError::UnknownTask` for identifiers outside the supported set.
    pub fn task_type(&self) -> ExportResult<TaskType> {
        self.task.parse()
    }

    /// A cursor over the input descriptors.
    pub fn input_cursor(&self) -> DescriptorCursor<'_, InputDescriptor> {
        DescriptorCursor::new(&self.inputs)
    }

    /// A cursor over the output descriptors.
    pub fn output_cursor(&self) -> DescriptorCursor<'_, OutputDescriptor> {
        DescriptorCursor::new(&self.outputs)
    }

    /// Names of the inputs in positional order.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|input| input.name.as_str()).collect()
    }

    /// Checks the descriptor lists against what the modality and task accept.
    pub fn validate(&self) -> ExportResult<TaskType> {
        let task = self.task_type()?;

        let max_inputs = match (self.modality, task) {
            (Modality::Text, _) => 3,
            (Modality::Vision, TaskType::MaskedIm) => 2,
            (Modality::Vision, _) => 1,
        };
        let min_inputs = match (self.modality, task) {
            (Modality::Vision, TaskType::MaskedIm) => 2,
            _ => 1,
        };
        if self.inputs.len() < min_inputs || self.inputs.len() > max_inputs {
            return Err(ExportError::invalid_input(format!(
                "{} task '{}' takes {}..={} inputs, configuration declares {}",
                self.modality,
                task,
                min_inputs,
                max_inputs,
                self.inputs.len()
            )));
        }

        if self.outputs.is_empty() {
            return Err(ExportError::invalid_input(format!(
                "task '{task}' declares no outputs"
            )));
        }
        if task.is_classifier() && self.outputs.len() < 2 {
            return Err(ExportError::invalid_input(format!(
                "classifier task '{task}' needs a probabilities and a label output"
            )));
        }

        let mut seen = HashSet::new();
        for name in self
            .inputs
            .iter()
            .map(|d| &d.name)
            .chain(self.outputs.iter().map(|d| &d.name))
        {
            if !seen.insert(name.as_str()) {
                return Err(ExportError::invalid_input(format!(
                    "feature name '{name}' is declared more than once"
                )));
            }
        }

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_config(task: &str) -> TaskConfiguration {
        TaskConfiguration::new(Modality::Text, task)
            .with_input(InputDescriptor::new("input_ids", "Indices of input sequence tokens"))
            .with_output(OutputDescriptor::new("last_hidden_state", "Hidden states"))
    }

    #[test]
    fn test_unknown_task_is_reported_on_resolution() {
        let config = text_config("foo");
        assert!(matches!(
            config.task_type(),
            Err(ExportError::UnknownTask { .. })
        ));
        assert!(matches!(
            config.validate(),
            Err(ExportError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_too_many_vision_inputs() {
        let config = TaskConfiguration::new(Modality::Vision, "image-classification")
            .with_input(InputDescriptor::new("image", "Input image"))
            .with_input(InputDescriptor::new("mask", "Extra"))
            .with_output(OutputDescriptor::new("probabilities", ""))
            .with_output(OutputDescriptor::new("classLabel", ""));
        assert!(matches!(
            config.validate(),
            Err(ExportError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_validate_requires_two_classifier_outputs() {
        let config = text_config("sequence-classification");
        assert!(config.validate().is_err());

        let config = config.with_output(OutputDescriptor::new("classLabel", ""));
        assert_eq!(
            config.validate().unwrap(),
            TaskType::SequenceClassification
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let config = text_config("default")
            .with_output(OutputDescriptor::new("input_ids", "clash"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_preserves_descriptor_order() {
        let config = TaskConfiguration::from_json_str(
            r#"{
                "modality": "text",
                "task": "question-answering",
                "inputs": [
                    {"name": "input_ids"},
                    {"name": "attention_mask"}
                ],
                "outputs": [
                    {"name": "start_scores"},
                    {"name": "end_scores"}
                ],
                "values_override": {"use_cache": false}
            }"#,
        )
        .unwrap();

        assert_eq!(config.input_names(), vec!["input_ids", "attention_mask"]);
        let names: Vec<_> = config.output_cursor().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["start_scores", "end_scores"]);
        assert_eq!(
            config.values_override.as_ref().unwrap().get("use_cache"),
            Some(&json!(false))
        );
        assert!(config.patched_ops.is_none());
    }

    #[test]
    fn test_with_override_and_patch_accumulate() {
        let config = text_config("default")
            .with_override("output_hidden_states", json!(false))
            .with_override("torchscript", json!(true))
            .with_patched_op("gelu", OpHandler::elementwise("tanh_gelu"));
        assert_eq!(config.values_override.unwrap().len(), 2);
        assert_eq!(config.patched_ops.unwrap()[0].0, "gelu");
    }
}
