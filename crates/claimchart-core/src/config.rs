//! Model provider selection and per-provider request defaults.
//!
//! A model id is resolved to its [`ModelProvider`] once, when configuration is
//! built. Request code only ever matches on the resolved variant.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const DEFAULT_MODEL_ID: &str = "deepseek-v3-250324";
pub const REASONING_MODEL_ID: &str = "deepseek-r1-250120";
pub const QWEN_MODEL_ID: &str = "qwen3-32b";
pub const DEEPSEEK_MODEL_ID: &str = "deepseek-chat";
pub const IMAGE_MODEL_ID: &str = "google/gemini-2.5-flash";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Backend that serves a given model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Volcano Engine (Ark); the default backend.
    Volcano,
    Qwen,
    DeepSeek,
    /// Image-capable backend used for multimodal judgments.
    Gemini,
}

impl ModelProvider {
    pub const ALL: [ModelProvider; 4] = [
        ModelProvider::Volcano,
        ModelProvider::Qwen,
        ModelProvider::DeepSeek,
        ModelProvider::Gemini,
    ];

    /// Resolve the provider from a model id.
    pub fn for_model(model_id: &str) -> Self {
        let id = model_id.to_ascii_lowercase();
        if id.contains("qwen") {
            Self::Qwen
        } else if id.contains("deepseek-chat") {
            Self::DeepSeek
        } else if id.contains("gemini") {
            Self::Gemini
        } else {
            Self::Volcano
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volcano => "volcano",
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
        }
    }

    /// Human-readable vendor name.
    pub fn vendor(&self) -> &'static str {
        match self {
            Self::Volcano => "Volcano Engine",
            Self::Qwen => "Alibaba Cloud",
            Self::DeepSeek => "DeepSeek",
            Self::Gemini => "Google",
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Self::Qwen => 16_000,
            Self::Volcano | Self::DeepSeek | Self::Gemini => 8_000,
        }
    }

    /// Provider-specific fields merged into the chat-completion request body.
    pub fn extra_body(&self) -> Map<String, Value> {
        let value = match self {
            Self::Qwen => json!({ "enable_thinking": false, "repetition_penalty": 1.05 }),
            Self::Volcano => json!({ "repetition_penalty": 1.05 }),
            Self::DeepSeek | Self::Gemini => json!({}),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model id together with its resolved provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ModelProvider,
    pub id: String,
}

impl ModelSpec {
    pub fn resolve(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            provider: ModelProvider::for_model(&id),
            id,
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::resolve(DEFAULT_MODEL_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model_families() {
        assert_eq!(ModelProvider::for_model("qwen3-32b"), ModelProvider::Qwen);
        assert_eq!(ModelProvider::for_model("Qwen-Max"), ModelProvider::Qwen);
        assert_eq!(
            ModelProvider::for_model("deepseek-chat"),
            ModelProvider::DeepSeek
        );
        assert_eq!(
            ModelProvider::for_model("google/gemini-2.5-flash"),
            ModelProvider::Gemini
        );
    }

    #[test]
    fn unknown_models_fall_back_to_volcano() {
        assert_eq!(
            ModelProvider::for_model("deepseek-v3-250324"),
            ModelProvider::Volcano
        );
        assert_eq!(ModelProvider::for_model(""), ModelProvider::Volcano);
    }

    #[test]
    fn qwen_gets_larger_budget_and_thinking_disabled() {
        assert_eq!(ModelProvider::Qwen.default_max_tokens(), 16_000);
        let extra = ModelProvider::Qwen.extra_body();
        assert_eq!(extra["enable_thinking"], false);
        assert_eq!(extra["repetition_penalty"], 1.05);
    }

    #[test]
    fn deepseek_sends_no_extra_fields() {
        assert!(ModelProvider::DeepSeek.extra_body().is_empty());
        assert_eq!(ModelProvider::DeepSeek.default_max_tokens(), 8_000);
    }

    #[test]
    fn default_spec_is_volcano_v3() {
        let spec = ModelSpec::default();
        assert_eq!(spec.id, DEFAULT_MODEL_ID);
        assert_eq!(spec.provider, ModelProvider::Volcano);
    }
}
