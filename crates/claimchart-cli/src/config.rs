//! Endpoint and credential settings, read from flags with environment fallback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use claimchart_ai::Judge;
use claimchart_core::config::{
    DEEPSEEK_MODEL_ID, DEFAULT_MODEL_ID, IMAGE_MODEL_ID, QWEN_MODEL_ID, REASONING_MODEL_ID,
};
use claimchart_core::{ModelProvider, ModelSpec};
use claimchart_http::{OpenAiCompatClient, ProviderRouter, RagflowClient};

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Volcano Engine API key
    #[arg(long, env = "API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Volcano Engine OpenAI-compatible base URL
    #[arg(
        long,
        env = "MODEL_URL",
        default_value = "https://ark.cn-beijing.volces.com/api/v3",
        global = true
    )]
    pub model_url: String,

    /// Model used when a command does not name one
    #[arg(long, env = "MODEL_ID_V3", default_value = DEFAULT_MODEL_ID, global = true)]
    pub default_model: String,

    /// Alibaba Cloud (Qwen) API key
    #[arg(long, env = "QWEN_API_KEY", hide_env_values = true, global = true)]
    pub qwen_api_key: Option<String>,

    #[arg(
        long,
        env = "QWEN_MODEL_URL",
        default_value = "https://dashscope.aliyuncs.com/compatible-mode/v1",
        global = true
    )]
    pub qwen_model_url: String,

    /// DeepSeek API key
    #[arg(long, env = "DS_API_KEY", hide_env_values = true, global = true)]
    pub ds_api_key: Option<String>,

    #[arg(
        long,
        env = "DS_MODEL_URL",
        default_value = "https://api.deepseek.com/v1",
        global = true
    )]
    pub ds_model_url: String,

    /// API key for the image-capable endpoint
    #[arg(long, env = "IMAGE_API_KEY", hide_env_values = true, global = true)]
    pub image_api_key: Option<String>,

    /// OpenAI-compatible base URL of the image-capable endpoint
    #[arg(long, env = "IMAGE_MODEL_URL", global = true)]
    pub image_model_url: Option<String>,

    #[arg(long, env = "IMAGE_MODEL_ID", default_value = IMAGE_MODEL_ID, global = true)]
    pub image_model: String,

    /// RAGFlow server root
    #[arg(long, env = "DOCUMENT_API_URL", global = true)]
    pub document_api_url: Option<String>,

    #[arg(long, env = "DOCUMENT_API_KEY", hide_env_values = true, global = true)]
    pub document_api_key: Option<String>,

    /// Chinese patent dataset; the default retrieval dataset
    #[arg(long, env = "ZH_DATASET_ID", global = true)]
    pub zh_dataset_id: Option<String>,

    /// English patent dataset
    #[arg(long, env = "EN_DATASET_ID", global = true)]
    pub en_dataset_id: Option<String>,

    /// Idle timeout for LLM calls, in seconds: the longest wait for the
    /// next bytes of a response, so long streamed replies are not cut off
    #[arg(long, env = "CLAIMCHART_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub timeout_secs: u64,
}

/// One entry of the model catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: &'static str,
    pub provider: ModelProvider,
    pub kind: &'static str,
    pub is_default: bool,
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetEntry {
    pub id: String,
    pub name: &'static str,
    pub language: &'static str,
    pub is_default: bool,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client shared by the LLM endpoints. `idle` bounds each read rather than the
/// whole response, since streamed judgments can run longer than any one gap.
fn llm_http_client(idle: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(idle)
        .build()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Settings {
    /// Router with a client for every provider that has credentials.
    pub fn router(&self) -> anyhow::Result<ProviderRouter> {
        let http = llm_http_client(Duration::from_secs(self.timeout_secs))
            .context("building HTTP client")?;

        let endpoints = [
            (ModelProvider::Volcano, non_empty(&self.api_key), Some(self.model_url.as_str())),
            (ModelProvider::Qwen, non_empty(&self.qwen_api_key), Some(self.qwen_model_url.as_str())),
            (ModelProvider::DeepSeek, non_empty(&self.ds_api_key), Some(self.ds_model_url.as_str())),
            (ModelProvider::Gemini, non_empty(&self.image_api_key), non_empty(&self.image_model_url)),
        ];

        let mut router = ProviderRouter::new();
        for (provider, key, url) in endpoints {
            if let (Some(key), Some(url)) = (key, url) {
                let client = OpenAiCompatClient::new(url, key).with_client(http.clone());
                router = router.with(provider, Arc::new(client));
            }
        }
        info!(providers = ?router.providers(), "LLM providers configured");
        Ok(router)
    }

    /// Judge for `model` (or the default model). Fails if its provider has no credentials.
    pub fn judge(&self, model: Option<&str>) -> anyhow::Result<Judge> {
        let router = self.router()?;
        let spec = ModelSpec::resolve(model.unwrap_or(&self.default_model));
        if !router.is_configured(spec.provider) {
            bail!(
                "model {} needs the {} provider, which has no API key configured",
                spec.id,
                spec.provider
            );
        }

        let mut judge = Judge::new(Arc::new(router))
            .with_model(spec)
            .with_image_model(ModelSpec::resolve(&self.image_model));

        if let (Some(url), Some(key)) = (
            non_empty(&self.document_api_url),
            non_empty(&self.document_api_key),
        ) {
            let retrieval = RagflowClient::new(url, key).context("building retrieval client")?;
            judge = judge.with_retrieval(Arc::new(retrieval), self.zh_dataset_id.clone());
        }
        Ok(judge)
    }

    /// Like [`Settings::judge`], but `None` when no provider is usable.
    pub fn optional_judge(&self, model: Option<&str>) -> anyhow::Result<Option<Judge>> {
        match self.judge(model) {
            Ok(judge) => Ok(Some(judge)),
            Err(e) => {
                warn!(error = %e, "LLM unavailable, analysis will stop after matching");
                Ok(None)
            }
        }
    }

    pub fn models(&self) -> Vec<ModelEntry> {
        let configured = |provider: ModelProvider| match provider {
            ModelProvider::Volcano => non_empty(&self.api_key).is_some(),
            ModelProvider::Qwen => non_empty(&self.qwen_api_key).is_some(),
            ModelProvider::DeepSeek => non_empty(&self.ds_api_key).is_some(),
            ModelProvider::Gemini => {
                non_empty(&self.image_api_key).is_some() && non_empty(&self.image_model_url).is_some()
            }
        };

        let mut entries = vec![
            (REASONING_MODEL_ID.to_string(), "DeepSeek R1", "general"),
            (DEFAULT_MODEL_ID.to_string(), "DeepSeek V3", "general"),
            (QWEN_MODEL_ID.to_string(), "Qwen 3", "general"),
            (DEEPSEEK_MODEL_ID.to_string(), "DeepSeek Chat", "general"),
            (self.image_model.clone(), "Gemini 2.5 Flash", "image_text"),
        ];
        if !entries.iter().any(|(id, _, _)| *id == self.default_model) {
            entries.insert(0, (self.default_model.clone(), "Custom", "general"));
        }

        entries
            .into_iter()
            .map(|(id, name, kind)| {
                let provider = ModelProvider::for_model(&id);
                ModelEntry {
                    is_default: id == self.default_model,
                    configured: configured(provider),
                    id,
                    name,
                    provider,
                    kind,
                }
            })
            .collect()
    }

    pub fn datasets(&self) -> Vec<DatasetEntry> {
        let mut datasets = Vec::new();
        if let Some(id) = non_empty(&self.zh_dataset_id) {
            datasets.push(DatasetEntry {
                id: id.to_string(),
                name: "Chinese patents",
                language: "zh",
                is_default: true,
            });
        }
        if let Some(id) = non_empty(&self.en_dataset_id) {
            datasets.push(DatasetEntry {
                id: id.to_string(),
                name: "English patents",
                language: "en",
                is_default: false,
            });
        }
        datasets
    }
}
