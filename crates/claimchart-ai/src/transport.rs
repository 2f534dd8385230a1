//! Capabilities the judgment stage consumes: chat completion and document retrieval.

use async_trait::async_trait;
use claimchart_core::ModelSpec;
use claimchart_core::config::DEFAULT_TEMPERATURE;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, TransportError};

/// Number of chunks requested from retrieval unless the caller says otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Incremental text deltas from a streaming completion.
///
/// Dropping the stream must release the underlying connection.
pub type DeltaStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One block of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image block carrying base64 JPEG data as a data URL.
    pub fn jpeg_base64(data: &str) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/jpeg;base64,{data}"),
            },
        }
    }
}

/// User message content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: ModelSpec,
    pub system: Option<String>,
    pub content: MessageContent,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Request with the provider's default token budget and temperature.
    pub fn new(model: ModelSpec, content: impl Into<MessageContent>) -> Self {
        Self {
            max_tokens: model.provider.default_max_tokens(),
            temperature: DEFAULT_TEMPERATURE,
            system: None,
            content: content.into(),
            model,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Plain-text view of the content, for logging and tests.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Chat-completion backend.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TransportError>;

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<DeltaStream, TransportError>;
}

fn unknown_source() -> String {
    "未知来源".to_string()
}

/// One retrieved passage. Accepts the RAGFlow chunk field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "similarity")]
    pub score: f64,
    #[serde(default = "unknown_source", alias = "document_keyword")]
    pub source: String,
}

/// External indexed document store.
#[async_trait]
pub trait DocumentRetrieval: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        dataset_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}
