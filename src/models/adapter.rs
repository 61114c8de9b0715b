//! The output adapter: a raw model wrapped to a task's output contract.
//!
//! The adapter resolves the task identifier into an [`OutputTask`] once, when
//! it is built. Every forward pass then takes the same path for that task, so
//! the adapted computation traces to a single fixed graph.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::tensor::Tensor;
use crate::core::traits::{Modality, ModelKwargs, PretrainedModel, TaskType};
use crate::domain::descriptors::{DescriptorCursor, OutputDescriptor};
use crate::domain::preprocessor::Preprocessor;
use crate::domain::tasks::TaskConfiguration;
use crate::processors::normalization::{ImageNormalization, divide_by_channel_std};
use crate::processors::ops::{argmax, interpolate_bilinear, softmax};
use std::fmt;
use tracing::debug;

/// Maximum number of positional inputs the adapted computation accepts.
pub const MAX_ADAPTER_INPUTS: usize = 3;

/// Axis a classification softmax runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftmaxAxis {
    /// Axis 1, the channel axis of image logits
    Classes,
    /// The last axis, the class axis of token and sequence logits
    Last,
}

impl SoftmaxAxis {
    fn index(self) -> isize {
        match self {
            SoftmaxAxis::Classes => 1,
            SoftmaxAxis::Last => -1,
        }
    }
}

/// The output transform of one task, with exactly the fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTask {
    /// Probabilities over the first raw output.
    Softmax { axis: SoftmaxAxis },
    /// Reconstructed pixels, skipping a leading loss tensor when present.
    MaskedImage,
    /// Class logits and predicted boxes, unchanged.
    ObjectDetection,
    /// Independent start and end position distributions.
    QuestionAnswering,
    /// Per-pixel logits, optionally resized to the input and collapsed to class ids.
    SemanticSegmentation { do_upsample: bool, do_argmax: bool },
    /// The first raw output, or the first two when several outputs are declared.
    Default { multi_output: bool },
}

impl OutputTask {
    /// Resolves the output transform of `task`.
    ///
    /// Segmentation reads its flags from the next descriptor of `outputs`.
    pub fn resolve(
        task: TaskType,
        outputs: &mut DescriptorCursor<'_, OutputDescriptor>,
    ) -> ExportResult<Self> {
        let resolved = match task {
            TaskType::ImageClassification => OutputTask::Softmax {
                axis: SoftmaxAxis::Classes,
            },
            TaskType::MaskedLm
            | TaskType::MultipleChoice
            | TaskType::NextSentencePrediction
            | TaskType::SequenceClassification
            | TaskType::TokenClassification => OutputTask::Softmax {
                axis: SoftmaxAxis::Last,
            },
            TaskType::MaskedIm => OutputTask::MaskedImage,
            TaskType::ObjectDetection => OutputTask::ObjectDetection,
            TaskType::QuestionAnswering => OutputTask::QuestionAnswering,
            TaskType::SemanticSegmentation => {
                let first = outputs.next().ok_or_else(|| {
                    ExportError::invalid_input("semantic-segmentation declares no outputs")
                })?;
                OutputTask::SemanticSegmentation {
                    do_upsample: first.do_upsample,
                    do_argmax: first.do_argmax,
                }
            }
            TaskType::Default => OutputTask::Default {
                multi_output: outputs.remaining() > 1,
            },
        };
        Ok(resolved)
    }

    /// Applies the transform to the raw model outputs.
    ///
    /// `input_hw` is the spatial size of the primary input, used when
    /// segmentation logits are upsampled.
    pub fn apply(&self, raw: Vec<Tensor>, input_hw: Option<(usize, usize)>) -> ExportResult<AdaptedOutput> {
        let mut raw = raw.into_iter();

        match *self {
            OutputTask::Softmax { axis } => {
                let logits = next_output(&mut raw, "logits")?;
                Ok(AdaptedOutput::Single(softmax(&logits, axis.index())?))
            }
            OutputTask::MaskedImage => {
                let first = next_output(&mut raw, "reconstruction")?;
                Ok(AdaptedOutput::Single(raw.next().unwrap_or(first)))
            }
            OutputTask::ObjectDetection => {
                let logits = next_output(&mut raw, "class logits")?;
                let boxes = next_output(&mut raw, "predicted boxes")?;
                Ok(AdaptedOutput::Pair(logits, boxes))
            }
            OutputTask::QuestionAnswering => {
                let start = next_output(&mut raw, "start logits")?;
                let end = next_output(&mut raw, "end logits")?;
                Ok(AdaptedOutput::Pair(softmax(&start, -1)?, softmax(&end, -1)?))
            }
            OutputTask::SemanticSegmentation {
                do_upsample,
                do_argmax,
            } => {
                let mut x = next_output(&mut raw, "segmentation logits")?;
                if do_upsample {
                    let size = input_hw.ok_or_else(|| {
                        ExportError::post_processing("upsampling needs an (N, C, H, W) input")
                    })?;
                    x = interpolate_bilinear(&x, size)?;
                }
                if do_argmax {
                    x = argmax(&x, 1)?;
                }
                Ok(AdaptedOutput::Single(x))
            }
            OutputTask::Default { multi_output } => {
                let first = next_output(&mut raw, "output")?;
                match (multi_output, raw.next()) {
                    (true, Some(second)) => Ok(AdaptedOutput::Pair(first, second)),
                    _ => Ok(AdaptedOutput::Single(first)),
                }
            }
        }
    }
}

fn next_output(raw: &mut impl Iterator<Item = Tensor>, what: &str) -> ExportResult<Tensor> {
    raw.next()
        .ok_or_else(|| ExportError::post_processing(format!("model produced no {what}")))
}

/// Output of the adapted computation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdaptedOutput {
    /// A single tensor
    Single(Tensor),
    /// An ordered pair of tensors
    Pair(Tensor, Tensor),
}

impl AdaptedOutput {
    /// Shapes of the tensors in order.
    pub fn shapes(&self) -> Vec<Vec<usize>> {
        match self {
            AdaptedOutput::Single(x) => vec![x.shape().to_vec()],
            AdaptedOutput::Pair(a, b) => vec![a.shape().to_vec(), b.shape().to_vec()],
        }
    }

    /// The tensors in order.
    pub fn into_vec(self) -> Vec<Tensor> {
        match self {
            AdaptedOutput::Single(x) => vec![x],
            AdaptedOutput::Pair(a, b) => vec![a, b],
        }
    }
}

/// A raw model wrapped so its forward pass emits a task's canonical outputs.
pub struct OutputAdapter<'m> {
    model: &'m dyn PretrainedModel,
    modality: Modality,
    task: TaskType,
    output_task: OutputTask,
    deferred_std: Option<[f32; 3]>,
}

impl<'m> OutputAdapter<'m> {
    /// Wraps `model` for the task declared by `config`.
    ///
    /// # Errors
    ///
    /// `UnknownTask` when the task identifier is outside the supported set.
    pub fn new(
        preprocessor: &Preprocessor,
        model: &'m dyn PretrainedModel,
        config: &TaskConfiguration,
    ) -> ExportResult<Self> {
        let task = config.task_type()?;
        let output_task = OutputTask::resolve(task, &mut config.output_cursor())?;
        let deferred_std = ImageNormalization::from_statistics(&preprocessor.statistics()).deferred_std;

        debug!(
            "Adapting {} model for '{}' as {:?}",
            model.config().model_type,
            task,
            output_task
        );

        Ok(Self {
            model,
            modality: config.modality,
            task,
            output_task,
            deferred_std,
        })
    }

    /// The task being adapted to.
    pub fn task(&self) -> TaskType {
        self.task
    }

    /// The resolved output transform.
    pub fn output_task(&self) -> OutputTask {
        self.output_task
    }

    /// The per-channel std divided out inside the forward pass, if any.
    pub fn deferred_std(&self) -> Option<[f32; 3]> {
        self.deferred_std
    }

    /// Runs the adapted computation on one primary and up to two auxiliary inputs.
    pub fn forward(&self, inputs: &[Tensor]) -> ExportResult<AdaptedOutput> {
        let (primary, auxiliary) = inputs
            .split_first()
            .ok_or_else(|| ExportError::invalid_input("adapted model needs a primary input"))?;
        if inputs.len() > MAX_ADAPTER_INPUTS {
            return Err(ExportError::invalid_input(format!(
                "adapted model takes at most {MAX_ADAPTER_INPUTS} inputs, got {}",
                inputs.len()
            )));
        }

        let normalized;
        let primary = match &self.deferred_std {
            Some(std) => {
                normalized = divide_by_channel_std(primary, std)?;
                &normalized
            }
            None => primary,
        };

        let mut kwargs = ModelKwargs::default();
        match self.modality {
            Modality::Text => {
                kwargs.attention_mask = auxiliary.first().cloned();
                kwargs.token_type_ids = auxiliary.get(1).cloned();
            }
            Modality::Vision if self.task == TaskType::MaskedIm => {
                kwargs.bool_masked_pos = auxiliary.first().cloned();
            }
            Modality::Vision => {}
        }

        let raw = self.model.forward(primary, &kwargs)?;

        let input_hw = match primary.shape() {
            [_, _, h, w] => Some((*h, *w)),
            _ => None,
        };
        self.output_task.apply(raw, input_hw)
    }
}

impl fmt::Debug for OutputAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputAdapter")
            .field("model_type", &self.model.config().model_type)
            .field("modality", &self.modality)
            .field("task", &self.task)
            .field("output_task", &self.output_task)
            .field("deferred_std", &self.deferred_std)
            .finish()
    }
}
