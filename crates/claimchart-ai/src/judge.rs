//! Per-feature LLM judgment: plain, retrieval-augmented, image-augmented and streaming.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{error, info, warn};

use claimchart_core::config::IMAGE_MODEL_ID;
use claimchart_core::{AnalysisType, JudgmentResult, ModelSpec};

use crate::error::{RetrievalError, TransportError};
use crate::image::{FileImageEncoder, ImageEncoder};
use crate::parser::{MarkerParser, ResponseParser};
use crate::prompt::{SYSTEM_PROMPT, augment_with_retrieved, build_prompt};
use crate::session::{StreamEvent, stream_judgment};
use crate::transport::{
    CompletionRequest, ContentPart, DEFAULT_TOP_K, DocumentRetrieval, LlmTransport,
};

/// Message used when an image-augmented judgment fails.
const IMAGE_FAILURE: &str = "图文分析失败";

/// Retrieval settings for one judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagContext {
    /// Empty means the judge's default dataset.
    pub dataset_ids: Vec<String>,
    pub top_k: usize,
}

impl RagContext {
    pub fn new(dataset_ids: Vec<String>) -> Self {
        Self {
            dataset_ids,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Default for RagContext {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Judges technical features against comparison content with an LLM.
pub struct Judge {
    transport: Arc<dyn LlmTransport>,
    retrieval: Option<Arc<dyn DocumentRetrieval>>,
    default_dataset: Option<String>,
    images: Arc<dyn ImageEncoder>,
    parser: Arc<dyn ResponseParser>,
    model: ModelSpec,
    image_model: ModelSpec,
}

impl Judge {
    pub fn new(transport: Arc<dyn LlmTransport>) -> Self {
        Self {
            transport,
            retrieval: None,
            default_dataset: None,
            images: Arc::new(FileImageEncoder),
            parser: Arc::new(MarkerParser),
            model: ModelSpec::default(),
            image_model: ModelSpec::resolve(IMAGE_MODEL_ID),
        }
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = model;
        self
    }

    pub fn with_image_model(mut self, model: ModelSpec) -> Self {
        self.image_model = model;
        self
    }

    /// Enable retrieval augmentation. `default_dataset` is used when a
    /// request names no datasets.
    pub fn with_retrieval(
        mut self,
        retrieval: Arc<dyn DocumentRetrieval>,
        default_dataset: Option<String>,
    ) -> Self {
        self.retrieval = Some(retrieval);
        self.default_dataset = default_dataset.filter(|id| !id.is_empty());
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_image_encoder(mut self, images: Arc<dyn ImageEncoder>) -> Self {
        self.images = images;
        self
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn image_model(&self) -> &ModelSpec {
        &self.image_model
    }

    /// Judge one feature, surfacing transport failures as errors.
    pub async fn try_judge(
        &self,
        feature_text: &str,
        compare_content: &str,
        user_instruction: &str,
        rag: Option<&RagContext>,
    ) -> Result<JudgmentResult, TransportError> {
        let (compare_content, retrieved) = match rag {
            Some(rag) => self.augment(feature_text, compare_content, rag).await,
            None => (compare_content.to_string(), 0),
        };

        let prompt = build_prompt(feature_text, &compare_content, user_instruction);
        let request = CompletionRequest::new(self.model.clone(), prompt);
        info!(model = %self.model.id, provider = %self.model.provider, "requesting judgment");

        let reply = self.transport.complete(request).await?;
        if reply.trim().is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        let mut result = self.parser.parse_or_degrade(&reply);
        result.model_used = Some(self.model.id.clone());
        result.analysis_type = Some(AnalysisType::Text);
        if retrieved > 0 {
            result.retrieved_docs = Some(retrieved);
        }
        info!(
            model = %self.model.id,
            disclosed = %result.is_disclosed,
            similarity = result.similarity,
            "judgment complete"
        );
        Ok(result)
    }

    /// Judge one feature. Transport failures become an error-status result.
    pub async fn judge(
        &self,
        feature_text: &str,
        compare_content: &str,
        user_instruction: &str,
        rag: Option<&RagContext>,
    ) -> JudgmentResult {
        match self
            .try_judge(feature_text, compare_content, user_instruction, rag)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(model = %self.model.id, error = %e, "judgment failed");
                JudgmentResult::error(e.to_string())
            }
        }
    }

    /// Judge with images attached, using the image-capable model.
    ///
    /// Images that cannot be read are left out of the request.
    pub async fn try_judge_with_images(
        &self,
        feature_text: &str,
        compare_content: &str,
        image_paths: &[PathBuf],
        user_instruction: &str,
    ) -> Result<JudgmentResult, TransportError> {
        let prompt = build_prompt(feature_text, compare_content, user_instruction);
        let mut parts = vec![ContentPart::text(prompt)];
        for path in image_paths {
            if let Some(data) = self.images.encode_to_base64(path).await {
                parts.push(ContentPart::jpeg_base64(&data));
            }
        }
        let attached = parts.len() - 1;
        info!(
            model = %self.image_model.id,
            requested = image_paths.len(),
            attached,
            "requesting image judgment"
        );

        let request = CompletionRequest::new(self.image_model.clone(), parts);
        let reply = self.transport.complete(request).await?;
        if reply.trim().is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        let mut result = self.parser.parse_or_degrade(&reply);
        result.model_used = Some(self.image_model.id.clone());
        result.analysis_type = Some(AnalysisType::ImageText);
        Ok(result)
    }

    pub async fn judge_with_images(
        &self,
        feature_text: &str,
        compare_content: &str,
        image_paths: &[PathBuf],
        user_instruction: &str,
    ) -> JudgmentResult {
        match self
            .try_judge_with_images(feature_text, compare_content, image_paths, user_instruction)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(model = %self.image_model.id, error = %e, "image judgment failed");
                let mut result = JudgmentResult::error(format!("{IMAGE_FAILURE}: {e}"));
                result.analysis_type = Some(AnalysisType::ImageText);
                result
            }
        }
    }

    /// Streaming judgment: deltas as they arrive, then one final or error event.
    pub fn judge_streaming(
        &self,
        feature_text: &str,
        compare_content: &str,
        user_instruction: &str,
    ) -> BoxStream<'static, StreamEvent> {
        let prompt = build_prompt(feature_text, compare_content, user_instruction);
        let request = CompletionRequest::new(self.model.clone(), prompt).with_system(SYSTEM_PROMPT);
        stream_judgment(Arc::clone(&self.transport), request, Arc::clone(&self.parser))
    }

    /// Append retrieved passages to `compare_content`. Never fails.
    async fn augment(
        &self,
        feature_text: &str,
        compare_content: &str,
        rag: &RagContext,
    ) -> (String, usize) {
        let Some(retrieval) = &self.retrieval else {
            warn!("retrieval requested but no retrieval client configured");
            return (compare_content.to_string(), 0);
        };

        let dataset_ids: Vec<String> = if rag.dataset_ids.is_empty() {
            self.default_dataset.iter().cloned().collect()
        } else {
            rag.dataset_ids.clone()
        };

        let chunks = if dataset_ids.is_empty() {
            Err(RetrievalError::NoDataset)
        } else {
            retrieval.retrieve(feature_text, &dataset_ids, rag.top_k).await
        };

        match chunks {
            Ok(chunks) => {
                info!(datasets = dataset_ids.len(), count = chunks.len(), "retrieved documents");
                (augment_with_retrieved(compare_content, &chunks), chunks.len())
            }
            Err(e) => {
                warn!(error = %e, "document retrieval failed, continuing without it");
                (compare_content.to_string(), 0)
            }
        }
    }
}
