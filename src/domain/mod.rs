//! Domain-level structures shared across the export pipeline.
//!
//! This module groups the declarative side of an export: the ordered input
//! and output descriptors, the preprocessor description, and the task
//! configuration that ties them to a task identifier.

pub mod descriptors;
pub mod preprocessor;
pub mod tasks;

pub use descriptors::{ColorLayout, DescriptorCursor, InputDescriptor, OutputDescriptor};
pub use preprocessor::{
    FeatureExtractorInfo, ImageSize, Preprocessor, PreprocessorStatistics, TokenizerInfo,
};
pub use tasks::{DummyInputOptions, DummyInputSet, TaskConfiguration};
