pub mod config;
pub mod error;
pub mod matcher;
pub mod model;
pub mod relevance;
pub mod segment;
pub mod task;

pub use config::{ModelProvider, ModelSpec};
pub use error::ChartError;
pub use matcher::{MatchOutcome, match_features};
pub use model::{
    AnalysisType, ComparisonDocument, Disclosure, Feature, JudgmentResult, JudgmentStatus,
    MatchRow,
};
pub use relevance::{DEFAULT_MAX_LENGTH, find_relevant};
pub use segment::{Segmentation, segment};
pub use task::{AnalysisTask, InMemoryTaskStore, TaskStatus, TaskStore, TaskUpdate};
