//! Traced form of the adapted computation.
//!
//! Tracing runs the adapter once on example inputs and records the graph
//! signature: how many inputs it takes and the rank and shape of every
//! output. The traced model is what the compile service receives.

use crate::core::errors::{ExportError, ExportResult};
use crate::core::tensor::Tensor;
use crate::core::traits::TaskType;
use crate::models::adapter::OutputAdapter;
use tracing::debug;

/// An adapted computation with a fixed, recorded signature.
#[derive(Debug)]
pub struct TracedModel<'m> {
    adapter: OutputAdapter<'m>,
    input_shapes: Vec<Vec<usize>>,
    output_shapes: Vec<Vec<usize>>,
}

impl<'m> TracedModel<'m> {
    /// Traces `adapter` on `example_inputs`.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the adapted forward pass.
    pub fn trace(adapter: OutputAdapter<'m>, example_inputs: &[Tensor]) -> ExportResult<Self> {
        let outputs = adapter.forward(example_inputs)?;
        let output_shapes = outputs.shapes();
        debug!(
            "Traced '{}' with {} input(s) and output shapes {:?}",
            adapter.task(),
            example_inputs.len(),
            output_shapes
        );

        Ok(Self {
            adapter,
            input_shapes: example_inputs.iter().map(|x| x.shape().to_vec()).collect(),
            output_shapes,
        })
    }

    /// Re-executes the traced computation.
    ///
    /// # Errors
    ///
    /// A `Tracing` processing error when the inputs or outputs differ in
    /// arity or rank from the recorded signature.
    pub fn run(&self, inputs: &[Tensor]) -> ExportResult<Vec<Tensor>> {
        if inputs.len() != self.input_shapes.len() {
            return Err(ExportError::tracing_error(format!(
                "traced with {} input(s), called with {}",
                self.input_shapes.len(),
                inputs.len()
            )));
        }
        for (i, (input, traced)) in inputs.iter().zip(&self.input_shapes).enumerate() {
            if input.ndim() != traced.len() {
                return Err(ExportError::tracing_error(format!(
                    "input {i} has rank {}, traced with rank {}",
                    input.ndim(),
                    traced.len()
                )));
            }
        }

        let outputs = self.adapter.forward(inputs)?.into_vec();
        if outputs.len() != self.output_shapes.len() {
            return Err(ExportError::tracing_error(format!(
                "traced graph has {} output(s), execution produced {}",
                self.output_shapes.len(),
                outputs.len()
            )));
        }
        for (i, (output, traced)) in outputs.iter().zip(&self.output_shapes).enumerate() {
            if output.ndim() != traced.len() {
                return Err(ExportError::tracing_error(format!(
                    "output {i} has rank {}, traced with rank {}",
                    output.ndim(),
                    traced.len()
                )));
            }
        }
        Ok(outputs)
    }

    /// Shapes of the example inputs the graph was traced with.
    pub fn input_shapes(&self) -> &[Vec<usize>] {
        &self.input_shapes
    }

    /// Shapes of the outputs observed while tracing.
    pub fn output_shapes(&self) -> &[Vec<usize>] {
        &self.output_shapes
    }

    /// Number of graph outputs.
    pub fn output_count(&self) -> usize {
        self.output_shapes.len()
    }

    /// Task of the traced adapter.
    pub fn task(&self) -> TaskType {
        self.adapter.task()
    }

    /// The traced adapter.
    pub fn adapter(&self) -> &OutputAdapter<'m> {
        &self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::filled;
    use crate::core::traits::Modality;
    use crate::domain::descriptors::{InputDescriptor, OutputDescriptor};
    use crate::domain::preprocessor::{Preprocessor, TokenizerInfo};
    use crate::domain::tasks::TaskConfiguration;
    use crate::testing::StubModel;

    fn config() -> TaskConfiguration {
        TaskConfiguration::new(Modality::Text, "default")
            .with_input(InputDescriptor::new("input_ids", ""))
            .with_input(InputDescriptor::new("attention_mask", ""))
            .with_output(OutputDescriptor::new("last_hidden_state", ""))
    }

    #[test]
    fn test_trace_records_signature() {
        let model = StubModel::returning(vec![filled(&[1, 4, 16], 0.0)]);
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let adapter = OutputAdapter::new(&tokenizer, &model, &config()).unwrap();
        let inputs = [filled(&[1, 4], 1.0), filled(&[1, 4], 1.0)];

        let traced = TracedModel::trace(adapter, &inputs).unwrap();
        assert_eq!(traced.input_shapes(), &[vec![1, 4], vec![1, 4]]);
        assert_eq!(traced.output_shapes(), &[vec![1, 4, 16]]);
        assert_eq!(traced.task(), TaskType::Default);

        let outputs = traced.run(&inputs).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_run_rejects_diverging_inputs() {
        let model = StubModel::returning(vec![filled(&[1, 4, 16], 0.0)]);
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let adapter = OutputAdapter::new(&tokenizer, &model, &config()).unwrap();
        let traced = TracedModel::trace(adapter, &[filled(&[1, 4], 1.0)]).unwrap();

        assert!(traced.run(&[filled(&[1, 4], 1.0), filled(&[1, 4], 1.0)]).is_err());
        assert!(matches!(
            traced.run(&[filled(&[4], 1.0)]),
            Err(ExportError::Processing { .. })
        ));
    }

    #[test]
    fn test_run_rejects_diverging_outputs() {
        let model = StubModel::with_outputs(|call| {
            if call == 0 {
                vec![filled(&[1, 4, 16], 0.0)]
            } else {
                vec![filled(&[1, 16], 0.0)]
            }
        });
        let tokenizer = Preprocessor::Tokenizer(TokenizerInfo::default());
        let adapter = OutputAdapter::new(&tokenizer, &model, &config()).unwrap();
        let traced = TracedModel::trace(adapter, &[filled(&[1, 4], 1.0)]).unwrap();

        assert!(traced.run(&[filled(&[1, 4], 1.0)]).is_err());
    }
}
