//! Task configurations and the dummy inputs derived from them.

pub mod configuration;
pub mod dummy_inputs;

pub use configuration::TaskConfiguration;
pub use dummy_inputs::{DummyInputOptions, DummyInputSet};
