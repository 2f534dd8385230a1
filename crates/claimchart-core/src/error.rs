use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("no technical features found in claim text")]
    SegmentationEmpty,

    #[error("no technical features to match; segment the claims first")]
    NoFeatures,

    #[error("no comparison documents provided")]
    NoDocuments,

    #[error("duplicate comparison document: {0}")]
    DuplicateDocument(String),

    #[error("analysis task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("analysis task already finished: {0}")]
    TaskFinalized(Uuid),
}
