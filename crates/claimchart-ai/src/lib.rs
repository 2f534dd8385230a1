//! LLM judgment layer: prompt construction, response parsing, streaming
//! judgment sessions and the task-tracked analysis pipeline.
//!
//! Network access is behind the [`LlmTransport`] and [`DocumentRetrieval`]
//! traits; concrete HTTP clients live in `claimchart-http`.

pub mod error;
pub mod image;
pub mod judge;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod transport;

#[cfg(test)]
mod fakes;

pub use error::{ParseError, RetrievalError, TransportError};
pub use image::{FileImageEncoder, ImageEncoder};
pub use judge::{Judge, RagContext};
pub use parser::{JsonResponseParser, MarkerParser, ResponseParser};
pub use pipeline::{AnalysisMode, AnalysisRequest, AnalysisRunner};
pub use session::StreamEvent;
pub use transport::{
    CompletionRequest, ContentPart, DEFAULT_TOP_K, DeltaStream, DocumentRetrieval, ImageUrl,
    LlmTransport, MessageContent, RetrievedChunk,
};
