//! Export option types.
//!
//! These are the knobs of the single public entry point: weight
//! quantization, output format, and compute-unit preference.

use super::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Weight quantization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantize {
    /// Keep 32-bit floating point weights.
    #[default]
    Float32,
    /// Store weights as 16-bit floats.
    Float16,
}

impl Quantize {
    /// Returns the identifier used on the command line and in configs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantize::Float32 => "float32",
            Quantize::Float16 => "float16",
        }
    }
}

impl FromStr for Quantize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float32" => Ok(Quantize::Float32),
            "float16" => Ok(Quantize::Float16),
            other => Err(ConfigError::InvalidConfig {
                message: format!(
                    "Unknown quantization mode '{other}', expected 'float32' or 'float16'"
                ),
            }),
        }
    }
}

impl std::fmt::Display for Quantize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware the exported model is allowed to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeUnit {
    /// CPU only.
    CpuOnly,
    /// CPU and GPU.
    CpuAndGpu,
    /// CPU, GPU and Neural Engine.
    #[default]
    All,
}

impl FromStr for ComputeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu_only" | "cpu" => Ok(ComputeUnit::CpuOnly),
            "cpu_and_gpu" | "gpu" => Ok(ComputeUnit::CpuAndGpu),
            "all" => Ok(ComputeUnit::All),
            other => Err(ConfigError::InvalidConfig {
                message: format!("Unknown compute unit '{other}'"),
            }),
        }
    }
}

/// Options controlling a single export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Weight quantization mode (default: float32)
    #[serde(default)]
    pub quantize: Quantize,
    /// Produce the older NeuralNetwork format instead of an ML Program (default: false)
    #[serde(default)]
    pub legacy: bool,
    /// Compute-unit preference (default: all)
    #[serde(default)]
    pub compute_units: ComputeUnit,
}

impl ExportOptions {
    /// Creates export options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quantization mode.
    pub fn with_quantize(mut self, quantize: Quantize) -> Self {
        self.quantize = quantize;
        self
    }

    /// Selects the legacy NeuralNetwork format.
    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// Sets the compute-unit preference.
    pub fn with_compute_units(mut self, compute_units: ComputeUnit) -> Self {
        self.compute_units = compute_units;
        self
    }

    /// Whether 16-bit precision is requested from the compile service itself.
    ///
    /// Legacy models are compiled at full precision and quantized afterwards.
    pub fn compile_in_float16(&self) -> bool {
        self.quantize == Quantize::Float16 && !self.legacy
    }

    /// Whether a post-compile weight quantization pass is required.
    pub fn quantize_after_compile(&self) -> bool {
        self.quantize == Quantize::Float16 && self.legacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_parses_known_modes() {
        assert_eq!("float32".parse::<Quantize>().unwrap(), Quantize::Float32);
        assert_eq!("float16".parse::<Quantize>().unwrap(), Quantize::Float16);
        assert!("int8".parse::<Quantize>().is_err());
    }

    #[test]
    fn test_float16_precision_split_by_format() {
        let modern = ExportOptions::new().with_quantize(Quantize::Float16);
        assert!(modern.compile_in_float16());
        assert!(!modern.quantize_after_compile());

        let legacy = modern.with_legacy(true);
        assert!(!legacy.compile_in_float16());
        assert!(legacy.quantize_after_compile());

        let full = ExportOptions::default();
        assert!(!full.compile_in_float16());
        assert!(!full.quantize_after_compile());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ExportOptions = serde_json::from_str(r#"{"quantize": "float16"}"#).unwrap();
        assert_eq!(options.quantize, Quantize::Float16);
        assert!(!options.legacy);
        assert_eq!(options.compute_units, ComputeUnit::All);
    }

    #[test]
    fn test_compute_unit_parse() {
        assert_eq!("CPU_ONLY".parse::<ComputeUnit>().unwrap(), ComputeUnit::CpuOnly);
        assert_eq!("all".parse::<ComputeUnit>().unwrap(), ComputeUnit::All);
        assert!("npu".parse::<ComputeUnit>().is_err());
    }
}
