//! Numeric building blocks of an export.
//!
//! # Modules
//!
//! * `input_types` - Input signature synthesis from preprocessor and configuration
//! * `normalization` - Image normalization folding and deferred std division
//! * `ops` - Softmax, arg-max and bilinear upsampling on tensors

pub mod input_types;
pub mod normalization;
pub mod ops;

pub use input_types::{ArrayDataType, InputSpec, synthesize_input_types};
pub use normalization::{
    ImageNormalization, NormalizeImage, divide_by_channel_std, is_image_std_same,
};
pub use ops::{argmax, interpolate_bilinear, normalize_axis, softmax};
