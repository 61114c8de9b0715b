//! Compiled artifacts and their editable description.
//!
//! The compile service returns a [`CompiledArtifact`]. The orchestrator then
//! edits its [`ModelDescription`] in place: feature names, human-readable
//! descriptions, classifier designation and user-defined metadata.

use crate::core::config::ComputeUnit;
use crate::core::errors::ExportResult;
use crate::domain::descriptors::ColorLayout;
use crate::processors::input_types::ArrayDataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the description inside a saved package directory.
pub const MANIFEST_FILE_NAME: &str = "Manifest.json";

/// Container format of the compiled model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// The older layer-based format
    NeuralNetwork,
    /// The program-based format
    MlProgram,
}

impl ModelFormat {
    /// Returns the format identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::NeuralNetwork => "neuralnetwork",
            ModelFormat::MlProgram => "mlprogram",
        }
    }
}

/// Precision of intermediate computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Float32,
    Float16,
}

/// Storage precision of the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPrecision {
    #[default]
    Float32,
    Float16,
}

/// Type of a model feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureType {
    /// A multi-array; an empty shape means the shape is not yet known.
    MultiArray {
        shape: Vec<usize>,
        data_type: ArrayDataType,
    },
    /// A color image.
    Image {
        width: usize,
        height: usize,
        color_layout: ColorLayout,
    },
    /// A label to probability dictionary.
    Dictionary,
    /// A string.
    String,
}

/// A named input or output of the compiled model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescription {
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(flatten)]
    pub feature_type: FeatureType,
}

impl FeatureDescription {
    /// Creates a feature with an empty description.
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            short_description: String::new(),
            feature_type,
        }
    }

    /// Overwrites the shape of a multi-array feature.
    ///
    /// Returns false and leaves the feature untouched for other types.
    pub fn set_multiarray_shape(&mut self, new_shape: &[usize]) -> bool {
        match &mut self.feature_type {
            FeatureType::MultiArray { shape, .. } => {
                *shape = new_shape.to_vec();
                true
            }
            _ => false,
        }
    }
}

/// The editable description of a compiled model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub inputs: Vec<FeatureDescription>,
    pub outputs: Vec<FeatureDescription>,
    /// Output holding the class probabilities of a classifier
    #[serde(default)]
    pub predicted_probabilities_name: Option<String>,
    /// Output holding the winning label of a classifier
    #[serde(default)]
    pub predicted_feature_name: Option<String>,
    #[serde(default)]
    pub user_defined: BTreeMap<String, String>,
}

impl ModelDescription {
    /// Output names in order.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name.as_str()).collect()
    }

    /// Input names in order.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn output_named(&self, name: &str) -> Option<&FeatureDescription> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn output_named_mut(&mut self, name: &str) -> Option<&mut FeatureDescription> {
        self.outputs.iter_mut().find(|o| o.name == name)
    }

    pub fn input_named(&self, name: &str) -> Option<&FeatureDescription> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Renames a feature everywhere it is referenced.
    ///
    /// Inputs, outputs and the classifier designation fields are all
    /// updated. Returns false when no feature has the old name.
    pub fn rename_feature(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.input_named(old).is_some() || self.output_named(old).is_some();
        }

        let mut renamed = false;
        for feature in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            if feature.name == old {
                feature.name = new.to_string();
                renamed = true;
            }
        }
        for designation in [
            &mut self.predicted_probabilities_name,
            &mut self.predicted_feature_name,
        ] {
            if designation.as_deref() == Some(old) {
                *designation = Some(new.to_string());
            }
        }
        if renamed {
            debug!("Renamed feature '{}' to '{}'", old, new);
        }
        renamed
    }

    /// Sets the human-readable description of an input.
    pub fn set_input_description(&mut self, name: &str, description: &str) -> bool {
        match self.inputs.iter_mut().find(|i| i.name == name) {
            Some(input) => {
                input.short_description = description.to_string();
                true
            }
            None => false,
        }
    }

    /// Sets the human-readable description of an output.
    pub fn set_output_description(&mut self, name: &str, description: &str) -> bool {
        match self.output_named_mut(name) {
            Some(output) => {
                output.short_description = description.to_string();
                true
            }
            None => false,
        }
    }
}

/// Result of compiling a traced model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub description: ModelDescription,
    pub format: ModelFormat,
    /// Compute precision requested at compile time; legacy models carry none
    #[serde(default)]
    pub precision: Option<Precision>,
    #[serde(default)]
    pub weight_precision: WeightPrecision,
    pub compute_units: ComputeUnit,
    /// Labels of a classifier model
    #[serde(default)]
    pub class_labels: Option<Vec<String>>,
    /// Op name to the label of the handler it was lowered with
    #[serde(default)]
    pub op_conversions: BTreeMap<String, String>,
}

impl CompiledArtifact {
    /// Whether the artifact is designated as a classifier.
    pub fn is_classifier(&self) -> bool {
        self.class_labels.is_some()
    }

    /// Writes the artifact as a package directory.
    ///
    /// The directory is created if needed. Returns the manifest path.
    pub fn save(&self, package_dir: impl AsRef<Path>) -> ExportResult<PathBuf> {
        let package_dir = package_dir.as_ref();
        fs::create_dir_all(package_dir)?;
        let manifest = package_dir.join(MANIFEST_FILE_NAME);
        fs::write(&manifest, serde_json::to_string_pretty(self)?)?;
        debug!("Saved package manifest to {}", manifest.display());
        Ok(manifest)
    }

    /// Reads an artifact back from a package directory.
    pub fn load(package_dir: impl AsRef<Path>) -> ExportResult<Self> {
        let contents = fs::read_to_string(package_dir.as_ref().join(MANIFEST_FILE_NAME))?;
        Ok(serde_json::from_str(&contents)?)
    }
}
