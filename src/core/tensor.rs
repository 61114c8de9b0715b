//! Dense tensor types shared across the pipeline.
//!
//! All tensors are dynamic-rank `f32` arrays. Integer inputs (token ids,
//! masks) are carried as whole-valued floats; their declared element type
//! lives in the synthesized input specs.

/// A dynamic-rank tensor of f32 values.
pub type Tensor = ndarray::ArrayD<f32>;

/// Returns the shape of a tensor as an owned vector.
pub fn shape_of(tensor: &Tensor) -> Vec<usize> {
    tensor.shape().to_vec()
}

/// Creates a tensor of the given shape filled with `value`.
pub fn filled(shape: &[usize], value: f32) -> Tensor {
    Tensor::from_elem(ndarray::IxDyn(shape), value)
}
