//! Input and output descriptors of a task configuration.
//!
//! Descriptors are declared in order, and the order is the contract: the
//! first input descriptor is the first positional input, the first output
//! descriptor names the first raw model output. Consumers walk them with a
//! [`DescriptorCursor`] instead of mutating the configuration.

use serde::{Deserialize, Serialize};

/// Pixel channel layout of an image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorLayout {
    /// Red, green, blue.
    #[default]
    RGB,
    /// Blue, green, red.
    BGR,
    /// Single-channel grayscale.
    G,
}

impl ColorLayout {
    /// Returns the layout identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorLayout::RGB => "RGB",
            ColorLayout::BGR => "BGR",
            ColorLayout::G => "G",
        }
    }
}

/// Declares one model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Feature name in the exported model
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Color layout for image inputs
    #[serde(default)]
    pub color_layout: Option<ColorLayout>,
}

impl InputDescriptor {
    /// Creates a descriptor with a name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            color_layout: None,
        }
    }

    /// Sets the color layout of an image input.
    pub fn with_color_layout(mut self, layout: ColorLayout) -> Self {
        self.color_layout = Some(layout);
        self
    }
}

/// Declares one model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    /// Feature name in the exported model
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Resize segmentation logits to the input resolution
    #[serde(default)]
    pub do_upsample: bool,
    /// Collapse segmentation logits to class indices
    #[serde(default)]
    pub do_argmax: bool,
}

impl OutputDescriptor {
    /// Creates a descriptor with a name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            do_upsample: false,
            do_argmax: false,
        }
    }

    /// Enables bilinear upsampling of segmentation logits.
    pub fn with_upsample(mut self, do_upsample: bool) -> Self {
        self.do_upsample = do_upsample;
        self
    }

    /// Enables arg-max over the class axis of segmentation logits.
    pub fn with_argmax(mut self, do_argmax: bool) -> Self {
        self.do_argmax = do_argmax;
        self
    }
}

/// A forward-only cursor over an ordered descriptor sequence.
///
/// Each descriptor is handed out at most once, in declaration order.
#[derive(Debug, Clone)]
pub struct DescriptorCursor<'a, T> {
    items: &'a [T],
    position: usize,
}

impl<'a, T> DescriptorCursor<'a, T> {
    /// Creates a cursor positioned at the first descriptor.
    pub fn new(items: &'a [T]) -> Self {
        Self { items, position: 0 }
    }

    /// Number of descriptors not yet consumed.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }

    /// Number of descriptors consumed so far.
    pub fn consumed(&self) -> usize {
        self.position
    }

    /// Whether every descriptor has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl<'a, T> Iterator for DescriptorCursor<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.position)?;
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl<T> ExactSizeIterator for DescriptorCursor<'_, T> {}
