//! Tensor operations applied by the output adapter.
//!
//! These are the only numeric transforms the adapted computation performs on
//! raw model outputs: softmax, arg-max and bilinear upsampling.

use crate::core::errors::{ExportError, ExportResult, OpaqueError};
use crate::core::tensor::Tensor;
use ndarray::{Array4, Axis, Ix4};
use rayon::prelude::*;

/// Resolves a possibly negative axis index against a tensor rank.
pub fn normalize_axis(axis: isize, ndim: usize) -> ExportResult<Axis> {
    let resolved = if axis < 0 { ndim as isize + axis } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(ExportError::tensor_operation(
            "axis out of range",
            OpaqueError(format!("axis {axis} for a rank-{ndim} tensor")),
        ));
    }
    Ok(Axis(resolved as usize))
}

/// Numerically stable softmax along `axis`.
///
/// Negative axes count from the end, so `-1` is the last axis.
pub fn softmax(input: &Tensor, axis: isize) -> ExportResult<Tensor> {
    let axis = normalize_axis(axis, input.ndim())?;
    let mut out = input.clone();
    for mut lane in out.lanes_mut(axis) {
        let max = lane.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        if sum > 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
    Ok(out)
}

/// Index of the maximum value along `axis`, returned as floats.
///
/// The reduced axis is removed. Ties resolve to the first index.
pub fn argmax(input: &Tensor, axis: isize) -> ExportResult<Tensor> {
    let axis = normalize_axis(axis, input.ndim())?;
    if input.len_of(axis) == 0 {
        return Err(ExportError::tensor_operation(
            "argmax over an empty axis",
            OpaqueError(format!("shape {:?}", input.shape())),
        ));
    }
    Ok(input.map_axis(axis, |lane| {
        let mut best = 0usize;
        let mut best_value = f32::NEG_INFINITY;
        for (i, &v) in lane.iter().enumerate() {
            if v > best_value {
                best = i;
                best_value = v;
            }
        }
        best as f32
    }))
}

#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    w_lo: f32,
    w_hi: f32,
}

fn taps(in_len: usize, out_len: usize) -> Vec<Tap> {
    (0..out_len)
        .map(|o| {
            let src = ((o as f32) + 0.5) * (in_len as f32) / (out_len as f32) - 0.5;
            let src = src.clamp(0.0, (in_len - 1) as f32);
            let lo = src.floor() as usize;
            let hi = (lo + 1).min(in_len - 1);
            let w_hi = src - lo as f32;
            Tap {
                lo,
                hi,
                w_lo: 1.0 - w_hi,
                w_hi,
            }
        })
        .collect()
}

/// Bilinear resize of an `(N, C, H, W)` tensor with `align_corners = false`.
///
/// Every `(n, c)` plane is resampled independently.
pub fn interpolate_bilinear(input: &Tensor, size: (usize, usize)) -> ExportResult<Tensor> {
    let (out_h, out_w) = size;
    let input = input
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| ExportError::tensor_operation("bilinear upsampling expects NCHW", e))?;
    let (n, c, in_h, in_w) = input.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Err(ExportError::resize_error(format!(
            "cannot resize {in_h}x{in_w} to {out_h}x{out_w}"
        )));
    }

    let y_taps = taps(in_h, out_h);
    let x_taps = taps(in_w, out_w);
    let base = input.as_standard_layout();
    let base = base
        .as_slice()
        .ok_or_else(|| ExportError::resize_error("input is not contiguous"))?;

    let in_plane = in_h * in_w;
    let out_plane = out_h * out_w;
    let mut out = vec![0f32; n * c * out_plane];
    out.par_chunks_mut(out_plane)
        .enumerate()
        .for_each(|(plane, chunk)| {
            let src = &base[plane * in_plane..(plane + 1) * in_plane];
            for (oy, ty) in y_taps.iter().enumerate() {
                for (ox, tx) in x_taps.iter().enumerate() {
                    chunk[oy * out_w + ox] = src[ty.lo * in_w + tx.lo] * ty.w_lo * tx.w_lo
                        + src[ty.lo * in_w + tx.hi] * ty.w_lo * tx.w_hi
                        + src[ty.hi * in_w + tx.lo] * ty.w_hi * tx.w_lo
                        + src[ty.hi * in_w + tx.hi] * ty.w_hi * tx.w_hi;
                }
            }
        });

    Ok(Array4::from_shape_vec((n, c, out_h, out_w), out)?.into_dyn())
}
