use claimchart_core::ModelProvider;
use thiserror::Error;

/// Failure of an LLM completion call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("response decode error: {0}")]
    Decode(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("no client configured for provider {0}")]
    Unconfigured(ModelProvider),
}

/// Failure of a document-retrieval call. Always degraded to zero documents.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("retrieval request failed: {0}")]
    Request(String),
    #[error("retrieval server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("no retrieval dataset configured")]
    NoDataset,
}

/// Failure of a structured response parse. Degraded to the raw reply.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoObject,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
