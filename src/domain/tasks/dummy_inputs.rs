//! Dummy inputs used to trace a model.
//!
//! Only shapes matter: token ids are all ones, masks are all ones or zeros,
//! and the image is a flat grey frame pushed through the preprocessor's
//! own normalization.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::tensor::{Tensor, filled, shape_of};
use crate::core::traits::{Modality, TaskType};
use crate::domain::descriptors::InputDescriptor;
use crate::domain::preprocessor::Preprocessor;
use crate::domain::tasks::TaskConfiguration;
use crate::impl_config_validator;
use crate::processors::normalization::NormalizeImage;
use image::{Rgb, RgbImage};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Grey level of the dummy image.
const DUMMY_PIXEL: u8 = 128;

/// Patch size assumed when a patch-based extractor does not declare one.
const DEFAULT_PATCH_SIZE: u32 = 16;

/// Parameters of the generated dummy inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DummyInputOptions {
    /// Batch dimension (default: 1)
    pub batch_size: usize,
    /// Text sequence length, capped by the tokenizer's limit (default: 128)
    pub sequence_length: usize,
    /// Number of choices for multiple-choice tasks (default: 4)
    pub num_choices: usize,
}

impl Default for DummyInputOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            sequence_length: 128,
            num_choices: 4,
        }
    }
}

impl_config_validator!(DummyInputOptions {
    batch_size: min(1),
    sequence_length: min(1),
    num_choices: min(1),
});

/// Named example tensors, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DummyInputSet {
    entries: Vec<(String, Tensor)>,
}

impl DummyInputSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the tensor for `name`.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = tensor,
            None => self.entries.push((name, tensor)),
        }
    }

    /// Returns the tensor for `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, tensor)| tensor)
    }

    /// Returns the shape of the tensor for `name`.
    pub fn shape_of(&self, name: &str) -> ExportResult<Vec<usize>> {
        self.get(name)
            .map(shape_of)
            .ok_or_else(|| ExportError::invalid_input(format!("no dummy input named '{name}'")))
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the tensors in the order the descriptors declare them.
    pub fn ordered_for(&self, descriptors: &[InputDescriptor]) -> ExportResult<Vec<Tensor>> {
        descriptors
            .iter()
            .map(|desc| {
                self.get(&desc.name).cloned().ok_or_else(|| {
                    ExportError::invalid_input(format!("no dummy input named '{}'", desc.name))
                })
            })
            .collect()
    }
}

impl TaskConfiguration {
    /// Generates the dummy inputs used to trace the adapted model.
    pub fn generate_dummy_inputs(&self, preprocessor: &Preprocessor) -> ExportResult<DummyInputSet> {
        use crate::core::config::ConfigValidator;
        self.dummy_inputs.validate()?;

        let task = self.task_type()?;
        match self.modality {
            Modality::Text => text_dummy_inputs(&self.inputs, task, &self.dummy_inputs, preprocessor),
            Modality::Vision => vision_dummy_inputs(&self.inputs, task, &self.dummy_inputs, preprocessor),
        }
    }
}

fn text_dummy_inputs(
    inputs: &[InputDescriptor],
    task: TaskType,
    options: &DummyInputOptions,
    preprocessor: &Preprocessor,
) -> ExportResult<DummyInputSet> {
    if inputs.len() > 3 {
        return Err(ExportError::invalid_input(format!(
            "text configurations declare at most three inputs, got {}",
            inputs.len()
        )));
    }

    let sequence_length = preprocessor
        .as_tokenizer()
        .map(|tokenizer| options.sequence_length.min(tokenizer.model_max_length))
        .unwrap_or(options.sequence_length);
    let shape = if task == TaskType::MultipleChoice {
        vec![options.batch_size, options.num_choices, sequence_length]
    } else {
        vec![options.batch_size, sequence_length]
    };

    let mut set = DummyInputSet::new();
    for (position, desc) in inputs.iter().enumerate() {
        // input_ids and attention_mask are ones, token_type_ids are zeros
        let value = if position == 2 { 0.0 } else { 1.0 };
        set.insert(desc.name.clone(), filled(&shape, value));
    }
    Ok(set)
}

fn vision_dummy_inputs(
    inputs: &[InputDescriptor],
    task: TaskType,
    options: &DummyInputOptions,
    preprocessor: &Preprocessor,
) -> ExportResult<DummyInputSet> {
    let extractor = preprocessor.as_feature_extractor().ok_or_else(|| {
        ExportError::invalid_input("vision configurations need an image feature extractor")
    })?;
    let mut cursor = inputs.iter();

    let image_desc = cursor
        .next()
        .ok_or_else(|| ExportError::invalid_input("vision configuration declares no image input"))?;
    let size = extractor.size;
    let image = RgbImage::from_pixel(size.width, size.height, Rgb([DUMMY_PIXEL; 3]));
    let normalize = NormalizeImage::new(
        extractor.rescale_factor,
        extractor.image_mean,
        extractor.image_std,
    )?;
    let pixels = normalize.apply(&image)?.insert_axis(Axis(0));
    let batch_shape = [options.batch_size, 3, size.height as usize, size.width as usize];
    let pixels = pixels
        .broadcast(ndarray::IxDyn(&batch_shape))
        .ok_or_else(|| {
            ExportError::invalid_input(format!("cannot broadcast dummy image to {batch_shape:?}"))
        })?
        .to_owned();

    let mut set = DummyInputSet::new();
    set.insert(image_desc.name.clone(), pixels);

    if task == TaskType::MaskedIm {
        let mask_desc = cursor.next().ok_or_else(|| {
            ExportError::invalid_input("masked-im configuration declares no mask input")
        })?;
        let patch = extractor.patch_size.unwrap_or(DEFAULT_PATCH_SIZE).max(1);
        let num_patches = ((size.height / patch) * (size.width / patch)) as usize;
        set.insert(
            mask_desc.name.clone(),
            filled(&[options.batch_size, num_patches], 0.0),
        );
    }

    if cursor.next().is_some() {
        return Err(ExportError::invalid_input(format!(
            "vision task '{task}' declares more inputs than it accepts"
        )));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preprocessor::{FeatureExtractorInfo, ImageSize, TokenizerInfo};

    fn tokenizer(max_len: usize) -> Preprocessor {
        Preprocessor::Tokenizer(TokenizerInfo {
            model_max_length: max_len,
        })
    }

    #[test]
    fn test_text_dummy_inputs_follow_descriptor_order() {
        let config = TaskConfiguration::new(Modality::Text, "default")
            .with_input(InputDescriptor::new("input_ids", ""))
            .with_input(InputDescriptor::new("attention_mask", ""))
            .with_input(InputDescriptor::new("token_type_ids", ""));
        let set = config.generate_dummy_inputs(&tokenizer(512)).unwrap();

        let names: Vec<_> = set.names().collect();
        assert_eq!(names, vec!["input_ids", "attention_mask", "token_type_ids"]);
        assert_eq!(set.shape_of("input_ids").unwrap(), vec![1, 128]);
        assert!(set.get("token_type_ids").unwrap().iter().all(|&v| v == 0.0));
        assert!(set.get("attention_mask").unwrap().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_sequence_length_capped_by_tokenizer() {
        let config = TaskConfiguration::new(Modality::Text, "multiple-choice")
            .with_input(InputDescriptor::new("input_ids", ""));
        let set = config.generate_dummy_inputs(&tokenizer(64)).unwrap();
        assert_eq!(set.shape_of("input_ids").unwrap(), vec![1, 4, 64]);
    }

    #[test]
    fn test_vision_dummy_inputs_for_masked_im() {
        let preprocessor = Preprocessor::FeatureExtractor(FeatureExtractorInfo {
            size: ImageSize::new(32, 64),
            patch_size: Some(16),
            ..Default::default()
        });
        let config = TaskConfiguration::new(Modality::Vision, "masked-im")
            .with_input(InputDescriptor::new("image", ""))
            .with_input(InputDescriptor::new("bool_masked_pos", ""));
        let set = config.generate_dummy_inputs(&preprocessor).unwrap();

        assert_eq!(set.shape_of("image").unwrap(), vec![1, 3, 32, 64]);
        assert_eq!(set.shape_of("bool_masked_pos").unwrap(), vec![1, 8]);
    }

    #[test]
    fn test_vision_requires_feature_extractor() {
        let config = TaskConfiguration::new(Modality::Vision, "image-classification")
            .with_input(InputDescriptor::new("image", ""));
        assert!(config.generate_dummy_inputs(&tokenizer(8)).is_err());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let config = TaskConfiguration::new(Modality::Text, "default")
            .with_input(InputDescriptor::new("input_ids", ""))
            .with_dummy_inputs(DummyInputOptions {
                batch_size: 0,
                ..Default::default()
            });
        assert!(matches!(
            config.generate_dummy_inputs(&tokenizer(8)),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn test_ordered_for_reports_missing_names() {
        let mut set = DummyInputSet::new();
        set.insert("input_ids", filled(&[1, 4], 1.0));
        set.insert("input_ids", filled(&[1, 8], 1.0));
        assert_eq!(set.len(), 1);
        assert_eq!(set.shape_of("input_ids").unwrap(), vec![1, 8]);

        let descs = vec![InputDescriptor::new("attention_mask", "")];
        assert!(set.ordered_for(&descs).is_err());
    }
}
