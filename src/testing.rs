//! Shared fixtures for unit tests.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::tensor::Tensor;
use crate::core::traits::{ModelConfig, ModelFramework, ModelKwargs, PretrainedModel};
use crate::pipeline::artifact::CompiledArtifact;
use crate::pipeline::compile::{CompileRequest, CompileService};
use crate::pipeline::manifest::ManifestCompiler;
use std::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard};

static GLOBAL_REGISTRY_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that compare or change the process-wide op registry.
pub(crate) fn lock_global_registry() -> MutexGuard<'static, ()> {
    GLOBAL_REGISTRY_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Behavior {
    Outputs(Box<dyn Fn(usize) -> Vec<Tensor>>),
    Echo,
}

/// A model whose forward pass is scripted by the test.
pub(crate) struct StubModel {
    config: ModelConfig,
    framework: ModelFramework,
    behavior: Behavior,
    calls: Cell<usize>,
    last_kwargs: RefCell<ModelKwargs>,
    last_input_shape: RefCell<Vec<usize>>,
}

impl StubModel {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            config: ModelConfig::new("bert"),
            framework: ModelFramework::PyTorch,
            behavior,
            calls: Cell::new(0),
            last_kwargs: RefCell::new(ModelKwargs::default()),
            last_input_shape: RefCell::new(Vec::new()),
        }
    }

    /// Returns the same outputs on every call.
    pub(crate) fn returning(outputs: Vec<Tensor>) -> Self {
        Self::with_behavior(Behavior::Outputs(Box::new(move |_| outputs.clone())))
    }

    /// Computes outputs from the zero-based call index.
    pub(crate) fn with_outputs(outputs: impl Fn(usize) -> Vec<Tensor> + 'static) -> Self {
        Self::with_behavior(Behavior::Outputs(Box::new(outputs)))
    }

    /// Returns the primary input as the only output.
    pub(crate) fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    pub(crate) fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn with_framework(mut self, framework: ModelFramework) -> Self {
        self.framework = framework;
        self
    }

    /// Number of forward passes so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    pub(crate) fn last_kwargs(&self) -> ModelKwargs {
        self.last_kwargs.borrow().clone()
    }

    pub(crate) fn last_input_shape(&self) -> Vec<usize> {
        self.last_input_shape.borrow().clone()
    }
}

impl PretrainedModel for StubModel {
    fn framework(&self) -> ModelFramework {
        self.framework.clone()
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ModelConfig {
        &mut self.config
    }

    fn forward(&self, input: &Tensor, kwargs: &ModelKwargs) -> ExportResult<Vec<Tensor>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        *self.last_kwargs.borrow_mut() = kwargs.clone();
        *self.last_input_shape.borrow_mut() = input.shape().to_vec();
        Ok(match &self.behavior {
            Behavior::Outputs(outputs) => outputs(call),
            Behavior::Echo => vec![input.clone()],
        })
    }
}

/// Counts calls and delegates to [`ManifestCompiler`].
#[derive(Default)]
pub(crate) struct RecordingCompiler {
    inner: ManifestCompiler,
    fail_compile: bool,
    compile_calls: Cell<usize>,
    reload_calls: Cell<usize>,
    quantize_calls: Cell<usize>,
}

impl RecordingCompiler {
    /// A service whose compile call always fails.
    pub(crate) fn failing() -> Self {
        Self {
            fail_compile: true,
            ..Self::default()
        }
    }

    pub(crate) fn compile_calls(&self) -> usize {
        self.compile_calls.get()
    }

    pub(crate) fn reload_calls(&self) -> usize {
        self.reload_calls.get()
    }

    pub(crate) fn quantize_calls(&self) -> usize {
        self.quantize_calls.get()
    }
}

impl CompileService for RecordingCompiler {
    fn compile(&self, request: CompileRequest<'_>) -> ExportResult<CompiledArtifact> {
        self.compile_calls.set(self.compile_calls.get() + 1);
        if self.fail_compile {
            return Err(ExportError::compile_error("conversion failed"));
        }
        self.inner.compile(request)
    }

    fn reload(&self, artifact: CompiledArtifact) -> ExportResult<CompiledArtifact> {
        self.reload_calls.set(self.reload_calls.get() + 1);
        self.inner.reload(artifact)
    }

    fn quantize_weights(
        &self,
        artifact: CompiledArtifact,
        nbits: u8,
    ) -> ExportResult<CompiledArtifact> {
        self.quantize_calls.set(self.quantize_calls.get() + 1);
        self.inner.quantize_weights(artifact, nbits)
    }
}
