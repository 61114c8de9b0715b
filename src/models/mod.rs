//! Model wrappers used during export.
//!
//! `adapter` wraps a raw model so its outputs follow a task contract, and
//! `traced` holds the adapted computation with its recorded graph signature.

pub mod adapter;
pub mod traced;

pub use adapter::{AdaptedOutput, MAX_ADAPTER_INPUTS, OutputAdapter, OutputTask, SoftmaxAxis};
pub use traced::TracedModel;
