//! Input type synthesis.
//!
//! Builds the declared input signature of the exported model from the
//! preprocessor, the task configuration and the dummy inputs. Text inputs
//! become integer tensors. A vision input becomes an image whose
//! normalization is folded into a scalar scale and a per-channel bias.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::traits::{Modality, TaskType};
use crate::domain::descriptors::{ColorLayout, DescriptorCursor, InputDescriptor};
use crate::domain::preprocessor::Preprocessor;
use crate::domain::tasks::{DummyInputSet, TaskConfiguration};
use crate::processors::normalization::ImageNormalization;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Element type of a multi-array feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayDataType {
    /// 32-bit signed integers
    Int32,
    /// 32-bit floats
    #[default]
    Float32,
}

/// One declared input of the compiled model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSpec {
    /// A plain multi-array input.
    Tensor {
        name: String,
        shape: Vec<usize>,
        dtype: ArrayDataType,
    },
    /// A color image, normalized as `pixel * scale + bias`.
    Image {
        name: String,
        shape: Vec<usize>,
        scale: f32,
        bias: [f32; 3],
        color_layout: ColorLayout,
        channel_first: bool,
    },
}

impl InputSpec {
    /// Feature name of the input.
    pub fn name(&self) -> &str {
        match self {
            InputSpec::Tensor { name, .. } | InputSpec::Image { name, .. } => name,
        }
    }

    /// Shape of the input as traced.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputSpec::Tensor { shape, .. } | InputSpec::Image { shape, .. } => shape,
        }
    }

    fn int_tensor(descriptor: &InputDescriptor, dummy_inputs: &DummyInputSet) -> ExportResult<Self> {
        Ok(InputSpec::Tensor {
            name: descriptor.name.clone(),
            shape: dummy_inputs.shape_of(&descriptor.name)?,
            dtype: ArrayDataType::Int32,
        })
    }
}

/// Synthesizes the ordered input specs for an export.
///
/// # Errors
///
/// `InvalidInput` when the configuration runs out of descriptors for a
/// mandatory input or a consumed descriptor has no dummy tensor. Both are
/// precondition violations of the caller.
pub fn synthesize_input_types(
    preprocessor: &Preprocessor,
    config: &TaskConfiguration,
    dummy_inputs: &DummyInputSet,
) -> ExportResult<Vec<InputSpec>> {
    let mut cursor = config.input_cursor();
    match config.modality {
        Modality::Text => text_input_types(&mut cursor, dummy_inputs),
        Modality::Vision => {
            let task = config.task_type()?;
            vision_input_types(preprocessor, task, &mut cursor, dummy_inputs)
        }
    }
}

fn text_input_types(
    cursor: &mut DescriptorCursor<'_, InputDescriptor>,
    dummy_inputs: &DummyInputSet,
) -> ExportResult<Vec<InputSpec>> {
    let input_ids = cursor
        .next()
        .ok_or_else(|| ExportError::invalid_input("text configuration declares no inputs"))?;
    let mut specs = vec![InputSpec::int_tensor(input_ids, dummy_inputs)?];

    for optional in ["attention_mask", "token_type_ids"] {
        match cursor.next() {
            Some(descriptor) => specs.push(InputSpec::int_tensor(descriptor, dummy_inputs)?),
            None => info!("Skipping {} input", optional),
        }
    }

    Ok(specs)
}

fn vision_input_types(
    preprocessor: &Preprocessor,
    task: TaskType,
    cursor: &mut DescriptorCursor<'_, InputDescriptor>,
    dummy_inputs: &DummyInputSet,
) -> ExportResult<Vec<InputSpec>> {
    let normalization = ImageNormalization::from_statistics(&preprocessor.statistics());

    let pixel_values = cursor
        .next()
        .ok_or_else(|| ExportError::invalid_input("vision configuration declares no image input"))?;
    let mut specs = vec![InputSpec::Image {
        name: pixel_values.name.clone(),
        shape: dummy_inputs.shape_of(&pixel_values.name)?,
        scale: normalization.scale,
        bias: normalization.bias,
        color_layout: pixel_values.color_layout.unwrap_or_default(),
        channel_first: true,
    }];

    if task == TaskType::MaskedIm {
        let mask = cursor.next().ok_or_else(|| {
            ExportError::invalid_input("masked-im configuration declares no mask input")
        })?;
        specs.push(InputSpec::int_tensor(mask, dummy_inputs)?);
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::filled;
    use crate::domain::preprocessor::{FeatureExtractorInfo, TokenizerInfo};
    use std::sync::{Arc, Mutex};

    fn text_config(names: &[&str]) -> (TaskConfiguration, DummyInputSet) {
        let mut config = TaskConfiguration::new(Modality::Text, "default");
        let mut dummy = DummyInputSet::new();
        for name in names {
            config = config.with_input(InputDescriptor::new(*name, ""));
            dummy.insert(*name, filled(&[1, 8], 1.0));
        }
        (config, dummy)
    }

    /// Collects formatted log lines written by a test subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_omitted_text_inputs_are_logged() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let (config, dummy) = text_config(&["input_ids"]);
        let specs = tracing::subscriber::with_default(subscriber, || {
            synthesize_input_types(&tokenizer, &config, &dummy)
        })
        .unwrap();

        assert_eq!(specs.len(), 1);
        let logs = buffer.contents();
        assert!(logs.contains("Skipping attention_mask input"), "{logs}");
        assert!(logs.contains("Skipping token_type_ids input"), "{logs}");
    }

    #[test]
    fn test_declared_text_inputs_are_not_logged_as_skipped() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let (config, dummy) = text_config(&["input_ids", "attention_mask"]);
        tracing::subscriber::with_default(subscriber, || {
            synthesize_input_types(&tokenizer, &config, &dummy)
        })
        .unwrap();

        let logs = buffer.contents();
        assert!(!logs.contains("Skipping attention_mask input"), "{logs}");
        assert!(logs.contains("Skipping token_type_ids input"), "{logs}");
    }

    #[test]
    fn test_text_inputs_follow_declared_order() {
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let all = ["input_ids", "attention_mask", "token_type_ids"];
        for count in 1..=3 {
            let (config, dummy) = text_config(&all[..count]);
            let specs = synthesize_input_types(&tokenizer, &config, &dummy).unwrap();

            assert_eq!(specs.len(), count);
            for (spec, expected) in specs.iter().zip(&all[..count]) {
                assert_eq!(spec.name(), *expected);
                assert_eq!(spec.shape(), &[1, 8]);
                assert!(matches!(
                    spec,
                    InputSpec::Tensor {
                        dtype: ArrayDataType::Int32,
                        ..
                    }
                ));
            }
        }
    }

    #[test]
    fn test_text_without_inputs_is_rejected() {
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let (config, dummy) = text_config(&[]);
        assert!(matches!(
            synthesize_input_types(&tokenizer, &config, &dummy),
            Err(ExportError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_missing_dummy_tensor_is_rejected() {
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let (config, _) = text_config(&["input_ids"]);
        assert!(synthesize_input_types(&tokenizer, &config, &DummyInputSet::new()).is_err());
    }

    fn vision_setup(task: &str, mean: [f32; 3], std: [f32; 3]) -> (Preprocessor, TaskConfiguration, DummyInputSet) {
        let extractor = Preprocessor::FeatureExtractor(FeatureExtractorInfo {
            image_mean: Some(mean),
            image_std: Some(std),
            ..FeatureExtractorInfo::default()
        });
        let mut config = TaskConfiguration::new(Modality::Vision, task)
            .with_input(InputDescriptor::new("pixel_values", "Input image"));
        let mut dummy = DummyInputSet::new();
        dummy.insert("pixel_values", filled(&[1, 3, 224, 224], 0.0));
        if task == "masked-im" {
            config = config.with_input(InputDescriptor::new("bool_masked_pos", "Mask"));
            dummy.insert("bool_masked_pos", filled(&[1, 196], 0.0));
        }
        (extractor, config, dummy)
    }

    #[test]
    fn test_uniform_std_folds_into_image_spec() {
        let (pre, config, dummy) = vision_setup("image-classification", [0.2, 0.4, 0.6], [0.5; 3]);
        let specs = synthesize_input_types(&pre, &config, &dummy).unwrap();
        assert_eq!(specs.len(), 1);

        match &specs[0] {
            InputSpec::Image {
                scale,
                bias,
                color_layout,
                channel_first,
                shape,
                ..
            } => {
                assert!((scale - 1.0 / (0.5 * 255.0)).abs() < 1e-7);
                assert!((bias[0] + 0.4).abs() < 1e-6);
                assert!((bias[1] + 0.8).abs() < 1e-6);
                assert!((bias[2] + 1.2).abs() < 1e-6);
                assert_eq!(*color_layout, ColorLayout::RGB);
                assert!(*channel_first);
                assert_eq!(shape, &[1, 3, 224, 224]);
            }
            other => panic!("expected an image spec, got {other:?}"),
        }
    }

    #[test]
    fn test_non_uniform_std_keeps_mean_only_bias() {
        let (pre, config, dummy) =
            vision_setup("image-classification", [0.485, 0.456, 0.406], [0.229, 0.224, 0.225]);
        let specs = synthesize_input_types(&pre, &config, &dummy).unwrap();

        match &specs[0] {
            InputSpec::Image { scale, bias, .. } => {
                assert!((scale - 1.0 / 255.0).abs() < 1e-9);
                assert_eq!(*bias, [-0.485, -0.456, -0.406]);
            }
            other => panic!("expected an image spec, got {other:?}"),
        }
    }

    #[test]
    fn test_masked_im_adds_mask_input() {
        let (pre, config, dummy) = vision_setup("masked-im", [0.5; 3], [0.5; 3]);
        let specs = synthesize_input_types(&pre, &config, &dummy).unwrap();

        assert_eq!(specs.len(), 2);
        assert!(matches!(specs[0], InputSpec::Image { .. }));
        assert_eq!(specs[1].name(), "bool_masked_pos");
        assert_eq!(specs[1].shape(), &[1, 196]);
    }

    #[test]
    fn test_masked_im_without_mask_descriptor_is_rejected() {
        let (pre, _, dummy) = vision_setup("masked-im", [0.5; 3], [0.5; 3]);
        let config = TaskConfiguration::new(Modality::Vision, "masked-im")
            .with_input(InputDescriptor::new("pixel_values", "Input image"));
        assert!(matches!(
            synthesize_input_types(&pre, &config, &dummy),
            Err(ExportError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_declared_color_layout_is_kept() {
        let (pre, _, dummy) = vision_setup("image-classification", [0.5; 3], [0.5; 3]);
        let config = TaskConfiguration::new(Modality::Vision, "image-classification").with_input(
            InputDescriptor::new("pixel_values", "Input image").with_color_layout(ColorLayout::BGR),
        );
        let specs = synthesize_input_types(&pre, &config, &dummy).unwrap();
        assert!(matches!(
            specs[0],
            InputSpec::Image {
                color_layout: ColorLayout::BGR,
                ..
            }
        ));
    }
}
