//! The export pipeline.
//!
//! This module drives an export end to end and defines the compile service
//! seam the traced model is handed to:
//! - `export` resolves the exporter and post-processes the compiled description
//! - `compile` defines the compile service trait and its request
//! - `manifest` is a compile service that writes a package manifest
//! - `artifact` holds the compiled artifact and its editable description

pub mod artifact;
pub mod compile;
pub mod export;
pub mod manifest;

pub use artifact::{
    CompiledArtifact, FeatureDescription, FeatureType, MANIFEST_FILE_NAME, ModelDescription,
    ModelFormat, Precision, WeightPrecision,
};
pub use compile::{ClassifierConfig, CompileRequest, CompileService};
pub use export::{
    FrameworkAvailability, ModelExporter, PyTorchExporter, UnsupportedExporter, export,
    export_with_frameworks, resolve_exporter,
};
pub use manifest::ManifestCompiler;
