//! Trait definitions for the export pipeline.
//!
//! `task` holds the closed set of task identifiers and modalities; `model`
//! holds the seam to the trained model being exported.

pub mod model;
pub mod task;

pub use model::{ModelConfig, ModelFramework, ModelKwargs, PretrainedModel};
pub use task::{Modality, TaskType};
