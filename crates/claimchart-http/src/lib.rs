//! HTTP capabilities: OpenAI-compatible chat completions (plain, streaming and
//! multimodal), per-provider routing and RAGFlow document retrieval.

#[cfg(feature = "http")]
pub mod error;
#[cfg(feature = "http")]
pub mod llm;
#[cfg(feature = "http")]
pub mod retrieval;
#[cfg(feature = "http")]
pub mod sse;

#[cfg(feature = "http")]
pub use error::ClientError;
#[cfg(feature = "http")]
pub use llm::{OpenAiCompatClient, ProviderRouter};
#[cfg(feature = "http")]
pub use retrieval::RagflowClient;
