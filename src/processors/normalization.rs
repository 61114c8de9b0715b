//! Image normalization for exported vision models.
//!
//! Core ML image inputs apply `pixel * scale + bias` with a single scalar
//! scale. A preprocessor whose per-channel standard deviations are all equal
//! can be folded into that scale and bias entirely. Otherwise only the mean
//! is folded and the division by the per-channel standard deviation is
//! deferred to the adapted computation itself.

use crate::core::errors::{ExportError, ExportResult, OpaqueError};
use crate::core::tensor::Tensor;
use crate::domain::preprocessor::PreprocessorStatistics;
use image::RgbImage;
use ndarray::{Array3, Array4};

/// Returns true when all three channel standard deviations are identical.
pub fn is_image_std_same(image_std: &[f32; 3]) -> bool {
    image_std[0] == image_std[1] && image_std[1] == image_std[2]
}

/// Normalization folded into an image input, plus whatever could not be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageNormalization {
    /// Scalar applied to raw 0..255 pixel values
    pub scale: f32,
    /// Per-channel offset added after scaling
    pub bias: [f32; 3],
    /// Per-channel standard deviation the adapted computation must divide by
    pub deferred_std: Option<[f32; 3]>,
}

impl ImageNormalization {
    /// Resolves scale, bias and deferred division from preprocessor statistics.
    ///
    /// `bias` starts as the negated mean (zeros without a mean). A uniform
    /// standard deviation `s` divides the bias and gives `scale = 1/(s*255)`;
    /// otherwise `scale = 1/255` and the standard deviation is deferred.
    pub fn from_statistics(stats: &PreprocessorStatistics) -> Self {
        let mut bias = match stats.image_mean {
            Some(mean) => [-mean[0], -mean[1], -mean[2]],
            None => [0.0; 3],
        };

        match stats.image_std {
            Some(std) if is_image_std_same(&std) => {
                for (b, s) in bias.iter_mut().zip(std) {
                    *b /= s;
                }
                Self {
                    scale: 1.0 / (std[0] * 255.0),
                    bias,
                    deferred_std: None,
                }
            }
            Some(std) => Self {
                scale: 1.0 / 255.0,
                bias,
                deferred_std: Some(std),
            },
            None => Self {
                scale: 1.0 / 255.0,
                bias,
                deferred_std: None,
            },
        }
    }
}

/// Divides an NCHW batch by a per-channel standard deviation.
///
/// # Errors
///
/// Fails when the input is not rank 4 with three channels.
pub fn divide_by_channel_std(input: &Tensor, image_std: &[f32; 3]) -> ExportResult<Tensor> {
    if input.ndim() != 4 || input.shape()[1] != 3 {
        return Err(ExportError::normalization(
            "per-channel std division expects an (N, 3, H, W) input",
            OpaqueError(format!("got shape {:?}", input.shape())),
        ));
    }
    let std = Array4::from_shape_vec((1, 3, 1, 1), image_std.to_vec())?;
    Ok(input / &std.into_dyn())
}

/// Converts an RGB image into a normalized CHW tensor.
///
/// Each channel value becomes `(pixel * rescale - mean) / std`, i.e.
/// `pixel * alpha + beta` with `alpha = rescale / std` and
/// `beta = -mean / std`.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = rescale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a normalizer from a rescale factor and optional statistics.
    ///
    /// A missing mean is treated as zero and a missing std as one.
    ///
    /// # Errors
    ///
    /// Returns an error if the rescale factor or any standard deviation is
    /// not a finite positive number.
    pub fn new(
        rescale: f32,
        mean: Option<[f32; 3]>,
        std: Option<[f32; 3]>,
    ) -> ExportResult<Self> {
        if !(rescale.is_finite() && rescale > 0.0) {
            return Err(ExportError::config_error(format!(
                "Rescale factor must be greater than 0, got {rescale}"
            )));
        }

        let mean = mean.unwrap_or([0.0; 3]);
        let std = std.unwrap_or([1.0; 3]);
        for (i, &s) in std.iter().enumerate() {
            if !(s.is_finite() && s > 0.0) {
                return Err(ExportError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        Ok(Self {
            alpha: [rescale / std[0], rescale / std[1], rescale / std[2]],
            beta: [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]],
        })
    }

    /// Normalizes an image into a `(3, H, W)` tensor.
    pub fn apply(&self, image: &RgbImage) -> ExportResult<Tensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ExportError::invalid_input("cannot normalize an empty image"));
        }

        let chw = Array3::from_shape_fn(
            (3, height as usize, width as usize),
            |(c, y, x)| {
                let value = image.get_pixel(x as u32, y as u32)[c] as f32;
                value * self.alpha[c] + self.beta[c]
            },
        );
        Ok(chw.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ProcessingStage;
    use image::Rgb;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_uniform_std_is_folded_into_scale_and_bias() {
        let stats = PreprocessorStatistics {
            image_mean: Some([0.4, 0.5, 0.6]),
            image_std: Some([0.5, 0.5, 0.5]),
        };
        let norm = ImageNormalization::from_statistics(&stats);

        assert!(approx(norm.scale, 1.0 / (0.5 * 255.0)));
        assert!(approx(norm.bias[0], -0.8));
        assert!(approx(norm.bias[1], -1.0));
        assert!(approx(norm.bias[2], -1.2));
        assert!(norm.deferred_std.is_none());
    }

    #[test]
    fn test_non_uniform_std_is_deferred() {
        let stats = PreprocessorStatistics {
            image_mean: Some([0.485, 0.456, 0.406]),
            image_std: Some([0.229, 0.224, 0.225]),
        };
        let norm = ImageNormalization::from_statistics(&stats);

        assert!(approx(norm.scale, 1.0 / 255.0));
        assert_eq!(norm.bias, [-0.485, -0.456, -0.406]);
        assert_eq!(norm.deferred_std, Some([0.229, 0.224, 0.225]));
    }

    #[test]
    fn test_missing_statistics_give_plain_rescale() {
        let norm = ImageNormalization::from_statistics(&PreprocessorStatistics::default());
        assert!(approx(norm.scale, 1.0 / 255.0));
        assert_eq!(norm.bias, [0.0; 3]);
        assert!(norm.deferred_std.is_none());
    }

    #[test]
    fn test_divide_by_channel_std() {
        let input = Tensor::from_elem(ndarray::IxDyn(&[1, 3, 2, 2]), 1.0);
        let out = divide_by_channel_std(&input, &[0.5, 0.25, 1.0]).unwrap();
        assert!(approx(out[[0, 0, 1, 1]], 2.0));
        assert!(approx(out[[0, 1, 0, 0]], 4.0));
        assert!(approx(out[[0, 2, 1, 0]], 1.0));

        let flat = Tensor::zeros(ndarray::IxDyn(&[3, 2]));
        match divide_by_channel_std(&flat, &[1.0; 3]) {
            Err(ExportError::Processing { kind, source, .. }) => {
                assert_eq!(kind, ProcessingStage::Normalization);
                assert_eq!(source.to_string(), "got shape [3, 2]");
            }
            other => panic!("expected a normalization error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_image_applies_mean_and_std() {
        let image = RgbImage::from_pixel(2, 1, Rgb([255, 0, 51]));
        let normalize = NormalizeImage::new(1.0 / 255.0, Some([0.5; 3]), Some([0.5; 3])).unwrap();
        let out = normalize.apply(&image).unwrap();

        assert_eq!(out.shape(), &[3, 1, 2]);
        assert!(approx(out[[0, 0, 0]], 1.0));
        assert!(approx(out[[1, 0, 1]], -1.0));
        assert!(approx(out[[2, 0, 0]], -0.6));
    }

    #[test]
    fn test_normalize_image_rejects_zero_std() {
        assert!(NormalizeImage::new(1.0 / 255.0, None, Some([0.2, 0.0, 0.2])).is_err());
        assert!(NormalizeImage::new(0.0, None, None).is_err());
    }
}
