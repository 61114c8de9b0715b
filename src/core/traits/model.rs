//! The raw-model seam of the export pipeline.
//!
//! `PretrainedModel` is what the output adapter wraps: a trained network with
//! its own configuration and a forward pass over dense tensors. The forward
//! computation itself is supplied by the model backend.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::tensor::Tensor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Framework a model was trained and is executed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFramework {
    /// A PyTorch-family trained model.
    PyTorch,
    /// A TensorFlow-family trained model.
    TensorFlow,
    /// Anything that is not a trained-model family the exporter knows.
    Other(String),
}

impl std::fmt::Display for ModelFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFramework::PyTorch => write!(f, "PyTorch"),
            ModelFramework::TensorFlow => write!(f, "TensorFlow"),
            ModelFramework::Other(name) => write!(f, "{name}"),
        }
    }
}

/// The model's own configuration object.
///
/// Known fields are typed; everything else lives in `attributes` so that
/// task configurations can override arbitrary values before tracing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Architecture family identifier (e.g. "bert", "segformer")
    pub model_type: String,
    /// Class index to label name
    #[serde(default)]
    pub id2label: BTreeMap<usize, String>,
    /// Version of the library the weights were saved with
    #[serde(default)]
    pub transformers_version: Option<String>,
    /// Free-form attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ModelConfig {
    /// Creates a config for the given model type.
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            ..Default::default()
        }
    }

    /// Sets the label map from labels listed in class-index order.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id2label = labels
            .into_iter()
            .enumerate()
            .map(|(idx, label)| (idx, label.into()))
            .collect();
        self
    }

    /// Number of output labels.
    pub fn num_labels(&self) -> usize {
        self.id2label.len()
    }

    /// Returns the attribute with the given name, if set.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets a configuration attribute by name.
    ///
    /// `transformers_version` and `id2label` update the typed fields; any
    /// other name is stored verbatim.
    pub fn set_attribute(&mut self, name: &str, value: Value) -> ExportResult<()> {
        match name {
            "transformers_version" => {
                self.transformers_version = value.as_str().map(str::to_owned);
            }
            "id2label" => {
                let labels: BTreeMap<String, String> = serde_json::from_value(value)?;
                self.id2label = labels
                    .into_iter()
                    .map(|(key, label)| {
                        key.parse::<usize>().map(|idx| (idx, label)).map_err(|_| {
                            ExportError::config_error(format!("id2label key '{key}' is not an index"))
                        })
                    })
                    .collect::<ExportResult<_>>()?;
            }
            _ => {
                self.attributes.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Returns the labels sorted by class index, skipping gaps in the index range.
    pub fn labels_as_list(&self) -> Vec<String> {
        (0..self.id2label.len())
            .filter_map(|idx| self.id2label.get(&idx).cloned())
            .collect()
    }

    /// Returns exactly `num_labels` labels for classes `0..num_labels`.
    ///
    /// # Errors
    ///
    /// Fails when a class index in that range has no label.
    pub fn class_labels(&self) -> ExportResult<Vec<String>> {
        (0..self.num_labels())
            .map(|idx| {
                self.id2label.get(&idx).cloned().ok_or_else(|| {
                    ExportError::config_error(format!("id2label has no entry for class {idx}"))
                })
            })
            .collect()
    }
}

/// Keyword arguments forwarded to the raw model.
#[derive(Debug, Clone, Default)]
pub struct ModelKwargs {
    /// Return a plain output sequence rather than a keyed output object.
    pub return_dict: bool,
    /// Text attention mask.
    pub attention_mask: Option<Tensor>,
    /// Text token type ids.
    pub token_type_ids: Option<Tensor>,
    /// Masked image modeling patch mask.
    pub bool_masked_pos: Option<Tensor>,
}

/// A trained model the exporter can wrap and trace.
pub trait PretrainedModel {
    /// Framework this model belongs to.
    fn framework(&self) -> ModelFramework {
        ModelFramework::PyTorch
    }

    /// The model's configuration.
    fn config(&self) -> &ModelConfig;

    /// Mutable access to the model's configuration, used for overrides.
    fn config_mut(&mut self) -> &mut ModelConfig;

    /// Runs the forward pass in inference mode.
    ///
    /// Returns the primary outputs in the model's positional order; auxiliary
    /// diagnostic tensors are never included.
    fn forward(&self, input: &Tensor, kwargs: &ModelKwargs) -> ExportResult<Vec<Tensor>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_attribute_stores_unknown_names() {
        let mut config = ModelConfig::new("bert");
        config.set_attribute("use_cache", json!(false)).unwrap();
        assert_eq!(config.attribute("use_cache"), Some(&json!(false)));
    }

    #[test]
    fn test_set_attribute_updates_label_map() {
        let mut config = ModelConfig::new("bert");
        config
            .set_attribute("id2label", json!({"0": "neg", "1": "pos"}))
            .unwrap();
        assert_eq!(config.class_labels().unwrap(), vec!["neg", "pos"]);
        assert!(config.set_attribute("id2label", json!({"x": "neg"})).is_err());
    }

    #[test]
    fn test_labels_as_list_skips_gaps() {
        let mut config = ModelConfig::new("segformer");
        config.id2label.insert(0, "road".into());
        config.id2label.insert(2, "sky".into());
        assert_eq!(config.labels_as_list(), vec!["road"]);
        assert!(config.class_labels().is_err());
    }
}
