//! Op-translation registry.
//!
//! The compile service lowers each source-framework operation through a
//! handler looked up by op name. A task configuration may replace handlers
//! for a single export. Patches are applied to a snapshot that is handed to
//! the compile call; the process-wide registry is only read during export.
//!
//! Registering handlers with [`register_global_op`] is a process-wide
//! mutation and must not race with exports that read overlapping op names.

use crate::core::errors::{ExportError, ExportResult};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Context handed to a conversion handler.
#[derive(Debug, Clone)]
pub struct OpContext<'a> {
    /// Name of the op being converted.
    pub op_name: &'a str,
    /// Shapes of the op's inputs.
    pub input_shapes: &'a [Vec<usize>],
}

type ConvertFn = dyn Fn(&OpContext<'_>) -> ExportResult<Vec<usize>> + Send + Sync;

/// A conversion handler for one source-framework op.
///
/// The handler maps input shapes to the lowered op's output shape.
#[derive(Clone)]
pub struct OpHandler {
    label: String,
    convert: Arc<ConvertFn>,
}

impl OpHandler {
    /// Creates a handler with a human-readable label.
    pub fn new<F>(label: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&OpContext<'_>) -> ExportResult<Vec<usize>> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            convert: Arc::new(convert),
        }
    }

    /// A handler whose output has the shape of its first input.
    pub fn elementwise(label: impl Into<String>) -> Self {
        Self::new(label, |ctx| {
            ctx.input_shapes.first().cloned().ok_or_else(|| {
                ExportError::compile_error(format!("op '{}' has no inputs", ctx.op_name))
            })
        })
    }

    /// Returns the handler label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the handler.
    pub fn convert(&self, ctx: &OpContext<'_>) -> ExportResult<Vec<usize>> {
        (self.convert)(ctx)
    }
}

impl Debug for OpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpHandler").field("label", &self.label).finish()
    }
}

impl PartialEq for OpHandler {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Arc::ptr_eq(&self.convert, &other.convert)
    }
}

/// Ordered set of op patches declared by a task configuration.
pub type OpPatchSet = Vec<(String, OpHandler)>;

/// A table from op name to conversion handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpRegistry {
    handlers: BTreeMap<String, OpHandler>,
}

impl OpRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in lowerings.
    pub fn with_builtin_ops() -> Self {
        let mut registry = Self::new();
        for name in [
            "add",
            "argmax",
            "div",
            "gelu",
            "layer_norm",
            "linear",
            "matmul",
            "mul",
            "softmax",
            "upsample_bilinear2d",
        ] {
            registry.register(name, OpHandler::elementwise(format!("builtin::{name}")));
        }
        registry
    }

    /// Registers a handler, returning the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, handler: OpHandler) -> Option<OpHandler> {
        self.handlers.insert(name.into(), handler)
    }

    /// Looks up the handler for an op.
    pub fn get(&self, name: &str) -> Option<&OpHandler> {
        self.handlers.get(name)
    }

    /// Whether a handler is registered for the op.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered ops.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns a copy of this registry with `patches` applied.
    ///
    /// The receiver is left untouched.
    pub fn patched(&self, patches: &[(String, OpHandler)]) -> Self {
        let mut snapshot = self.clone();
        for (name, handler) in patches {
            tracing::info!("Patching conversion op '{}' with {}", name, handler.label());
            if let Some(previous) = snapshot.register(name.clone(), handler.clone()) {
                tracing::debug!("Conversion op '{}' shadows {}", name, previous.label());
            }
        }
        snapshot
    }
}

static GLOBAL_OP_REGISTRY: Lazy<RwLock<OpRegistry>> =
    Lazy::new(|| RwLock::new(OpRegistry::with_builtin_ops()));

/// Returns a copy of the process-wide registry.
pub fn global_op_registry_snapshot() -> ExportResult<OpRegistry> {
    GLOBAL_OP_REGISTRY
        .read()
        .map(|registry| registry.clone())
        .map_err(|_| ExportError::compile_error("op registry lock poisoned"))
}

/// Registers a handler in the process-wide registry.
pub fn register_global_op(
    name: impl Into<String>,
    handler: OpHandler,
) -> ExportResult<Option<OpHandler>> {
    GLOBAL_OP_REGISTRY
        .write()
        .map(|mut registry| registry.register(name, handler))
        .map_err(|_| ExportError::compile_error("op registry lock poisoned"))
}
