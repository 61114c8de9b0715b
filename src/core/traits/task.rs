//! Task identifiers for the export pipeline.
//!
//! A task names the output contract an exported model must satisfy. The set
//! is closed: every task the adapter knows how to shape is listed here, and
//! parsing any other identifier fails with `ExportError::UnknownTask`.

use crate::core::errors::ExportError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether a task's primary input is textual or image-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Token ids plus optional attention mask and token type ids.
    Text,
    /// A single channel-first color image.
    Vision,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Vision => write!(f, "vision"),
        }
    }
}

/// Represents the task an exported model is annotated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Raw hidden states (and pooled output when declared).
    Default,
    /// Image classification with class probabilities over channel axis 1.
    ImageClassification,
    /// Masked image modeling reconstruction.
    MaskedIm,
    /// Masked language modeling.
    MaskedLm,
    /// Multiple choice scoring.
    MultipleChoice,
    /// Next sentence prediction.
    NextSentencePrediction,
    /// Object detection (logits and predicted boxes).
    ObjectDetection,
    /// Extractive question answering (start and end distributions).
    QuestionAnswering,
    /// Per-pixel semantic segmentation.
    SemanticSegmentation,
    /// Sequence classification.
    SequenceClassification,
    /// Per-token classification.
    TokenClassification,
}

impl TaskType {
    /// Every supported task, in identifier order.
    pub const ALL: [TaskType; 11] = [
        TaskType::Default,
        TaskType::ImageClassification,
        TaskType::MaskedIm,
        TaskType::MaskedLm,
        TaskType::MultipleChoice,
        TaskType::NextSentencePrediction,
        TaskType::ObjectDetection,
        TaskType::QuestionAnswering,
        TaskType::SemanticSegmentation,
        TaskType::SequenceClassification,
        TaskType::TokenClassification,
    ];

    /// Returns the identifier used in task configurations.
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::Default => "default",
            TaskType::ImageClassification => "image-classification",
            TaskType::MaskedIm => "masked-im",
            TaskType::MaskedLm => "masked-lm",
            TaskType::MultipleChoice => "multiple-choice",
            TaskType::NextSentencePrediction => "next-sentence-prediction",
            TaskType::ObjectDetection => "object-detection",
            TaskType::QuestionAnswering => "question-answering",
            TaskType::SemanticSegmentation => "semantic-segmentation",
            TaskType::SequenceClassification => "sequence-classification",
            TaskType::TokenClassification => "token-classification",
        }
    }

    /// Tasks whose compiled artifact is designated a classifier: a probability
    /// dictionary plus a winning-label output.
    pub fn is_classifier(&self) -> bool {
        matches!(
            self,
            TaskType::ImageClassification
                | TaskType::MultipleChoice
                | TaskType::NextSentencePrediction
                | TaskType::SequenceClassification
        )
    }

    /// Tasks that attach the model's label list as `classes` metadata.
    pub fn publishes_class_list(&self) -> bool {
        matches!(
            self,
            TaskType::ObjectDetection
                | TaskType::SemanticSegmentation
                | TaskType::TokenClassification
        )
    }
}

impl FromStr for TaskType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|task| task.name() == s)
            .ok_or_else(|| ExportError::unknown_task(s))
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_task_round_trips_through_identifier() {
        for task in TaskType::ALL {
            assert_eq!(task.name().parse::<TaskType>().unwrap(), task);
        }
    }

    #[test]
    fn test_unknown_identifier_is_unknown_task() {
        match "foo".parse::<TaskType>() {
            Err(ExportError::UnknownTask { task }) => assert_eq!(task, "foo"),
            other => panic!("expected UnknownTask, got {other:?}"),
        }
    }

    #[test]
    fn test_serde_uses_identifiers() {
        let json = serde_json::to_string(&TaskType::QuestionAnswering).unwrap();
        assert_eq!(json, "\"question-answering\"");
        let modality: Modality = serde_json::from_str("\"vision\"").unwrap();
        assert_eq!(modality, Modality::Vision);
    }

    #[test]
    fn test_classifier_designation() {
        let classifiers: Vec<_> = TaskType::ALL.iter().filter(|t| t.is_classifier()).collect();
        assert_eq!(classifiers.len(), 4);
        assert!(!TaskType::TokenClassification.is_classifier());
        assert!(TaskType::TokenClassification.publishes_class_list());
    }
}
