//! Preprocessor descriptions consumed by the exporter.
//!
//! Only the parts of a tokenizer or feature extractor that shape the exported
//! model are modelled: sequence limits for text, and resize/normalization
//! statistics for images.

use serde::{Deserialize, Serialize};

/// Spatial size an image preprocessor resizes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Height in pixels
    pub height: u32,
    /// Width in pixels
    pub width: u32,
}

impl ImageSize {
    /// Creates a size from height and width.
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

/// Tokenizer properties relevant to export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerInfo {
    /// Maximum sequence length the model accepts
    pub model_max_length: usize,
}

impl Default for TokenizerInfo {
    fn default() -> Self {
        Self {
            model_max_length: 512,
        }
    }
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

/// Image feature extractor properties relevant to export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractorInfo {
    /// Per-channel mean, in the 0..1 range
    #[serde(default)]
    pub image_mean: Option<[f32; 3]>,
    /// Per-channel standard deviation, in the 0..1 range
    #[serde(default)]
    pub image_std: Option<[f32; 3]>,
    /// Target resize
    pub size: ImageSize,
    /// Factor applied to raw 0..255 pixel values (default: 1/255)
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    /// Patch size of patch-based vision encoders
    #[serde(default)]
    pub patch_size: Option<u32>,
}

impl Default for FeatureExtractorInfo {
    fn default() -> Self {
        Self {
            image_mean: Some([0.485, 0.456, 0.406]),
            image_std: Some([0.229, 0.224, 0.225]),
            size: ImageSize::new(224, 224),
            rescale_factor: default_rescale_factor(),
            patch_size: None,
        }
    }
}

/// The preprocessor paired with the model being exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preprocessor {
    /// Text tokenizer.
    Tokenizer(TokenizerInfo),
    /// Image feature extractor.
    FeatureExtractor(FeatureExtractorInfo),
}

/// Per-channel normalization statistics exposed by a preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreprocessorStatistics {
    /// Per-channel mean, if the preprocessor exposes one
    pub image_mean: Option<[f32; 3]>,
    /// Per-channel standard deviation, if the preprocessor exposes one
    pub image_std: Option<[f32; 3]>,
}

impl Preprocessor {
    /// Returns the normalization statistics; tokenizers expose none.
    pub fn statistics(&self) -> PreprocessorStatistics {
        match self {
            Preprocessor::Tokenizer(_) => PreprocessorStatistics::default(),
            Preprocessor::FeatureExtractor(info) => PreprocessorStatistics {
                image_mean: info.image_mean,
                image_std: info.image_std,
            },
        }
    }

    /// Returns the feature extractor properties, if this is one.
    pub fn as_feature_extractor(&self) -> Option<&FeatureExtractorInfo> {
        match self {
            Preprocessor::FeatureExtractor(info) => Some(info),
            Preprocessor::Tokenizer(_) => None,
        }
    }

    /// Returns the tokenizer properties, if this is one.
    pub fn as_tokenizer(&self) -> Option<&TokenizerInfo> {
        match self {
            Preprocessor::Tokenizer(info) => Some(info),
            Preprocessor::FeatureExtractor(_) => None,
        }
    }
}
