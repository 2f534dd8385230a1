//! OpenAI-compatible chat-completion client and per-provider routing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use claimchart_ai::{CompletionRequest, DeltaStream, LlmTransport, TransportError};
use claimchart_core::ModelProvider;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{ClientError, check_status};
use crate::sse::delta_stream;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the `/chat/completions` request body, provider extras included.
pub fn request_body(request: &CompletionRequest, stream: bool) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.content }));

    let mut body = json!({
        "model": request.model.id,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "stream": stream,
    });
    if let Value::Object(map) = &mut body {
        map.extend(request.model.provider.extra_body());
    }
    body
}

/// Extract the first choice's text from a non-streaming response body.
pub fn parse_completion(body: &str) -> Result<String, TransportError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| TransportError::from(ClientError::Json(e)))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(TransportError::EmptyResponse)
}

/// Client for one OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    /// `base_url` is the API root, e.g. `https://api.deepseek.com/v1`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Use a preconfigured client, e.g. one with a request timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        info!(
            url = %url,
            model = %request.model.id,
            stream,
            max_tokens = request.max_tokens,
            "sending chat completion"
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body(request, stream))
            .send()
            .await?;
        check_status(resp).await
    }
}

#[async_trait]
impl LlmTransport for OpenAiCompatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TransportError> {
        let resp = self.post(&request, false).await?;
        let body = resp.text().await.map_err(ClientError::from)?;
        let text = parse_completion(&body)?;
        debug!(model = %request.model.id, chars = text.chars().count(), "completion received");
        Ok(text)
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<DeltaStream, TransportError> {
        let resp = self.post(&request, true).await?;
        Ok(delta_stream(resp.bytes_stream()))
    }
}

/// Dispatches each request to the client registered for its model's provider.
#[derive(Default)]
pub struct ProviderRouter {
    clients: HashMap<ModelProvider, Arc<dyn LlmTransport>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: ModelProvider, client: Arc<dyn LlmTransport>) -> Self {
        self.clients.insert(provider, client);
        self
    }

    pub fn is_configured(&self, provider: ModelProvider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// Configured providers in declaration order.
    pub fn providers(&self) -> Vec<ModelProvider> {
        ModelProvider::ALL
            .into_iter()
            .filter(|p| self.is_configured(*p))
            .collect()
    }

    fn route(&self, provider: ModelProvider) -> Result<&Arc<dyn LlmTransport>, TransportError> {
        self.clients
            .get(&provider)
            .ok_or(TransportError::Unconfigured(provider))
    }
}

#[async_trait]
impl LlmTransport for ProviderRouter {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TransportError> {
        self.route(request.model.provider)?.complete(request).await
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<DeltaStream, TransportError> {
        self.route(request.model.provider)?
            .complete_streaming(request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimchart_ai::ContentPart;
    use claimchart_core::ModelSpec;
    use futures::StreamExt;
    use futures::stream;

    /// Replies with its own name so routing is observable.
    struct Named(&'static str);

    #[async_trait]
    impl LlmTransport for Named {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, TransportError> {
            Ok(self.0.to_string())
        }

        async fn complete_streaming(
            &self,
            _request: CompletionRequest,
        ) -> Result<DeltaStream, TransportError> {
            Ok(stream::iter(vec![Ok(self.0.to_string())]).boxed())
        }
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest::new(ModelSpec::resolve(model), "prompt".to_string())
    }

    #[test]
    fn body_carries_qwen_extras() {
        let body = request_body(&request("qwen3-32b"), false);
        assert_eq!(body["model"], "qwen3-32b");
        assert_eq!(body["max_tokens"], 16_000);
        assert_eq!(body["stream"], false);
        assert_eq!(body["enable_thinking"], false);
        assert_eq!(body["repetition_penalty"], 1.05);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "prompt");
    }

    #[test]
    fn body_puts_system_prompt_first() {
        let req = request("deepseek-chat").with_system("system text");
        let body = request_body(&req, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("repetition_penalty").is_none());
    }

    #[test]
    fn body_sends_multimodal_parts() {
        let req = CompletionRequest::new(
            ModelSpec::resolve("google/gemini-2.5-flash"),
            vec![ContentPart::text("prompt"), ContentPart::jpeg_base64("QUJD")],
        );
        let body = request_body(&req, false);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(body["max_tokens"], 8_000);
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "相似度：80"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "相似度：80");
    }

    #[test]
    fn empty_choices_are_an_empty_response() {
        assert_eq!(
            parse_completion(r#"{"choices": []}"#),
            Err(TransportError::EmptyResponse)
        );
        assert_eq!(
            parse_completion(r#"{"choices": [{"message": {"content": null}}]}"#),
            Err(TransportError::EmptyResponse)
        );
        assert!(matches!(
            parse_completion("<html>"),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OpenAiCompatClient::new("https://api.deepseek.com/v1/", "key");
        assert_eq!(client.base_url(), "https://api.deepseek.com/v1");
    }

    #[tokio::test]
    async fn router_dispatches_by_provider() {
        let router = ProviderRouter::new()
            .with(ModelProvider::Volcano, Arc::new(Named("volcano")))
            .with(ModelProvider::Qwen, Arc::new(Named("qwen")));

        assert_eq!(router.complete(request("qwen3-32b")).await.unwrap(), "qwen");
        assert_eq!(
            router.complete(request("deepseek-v3-250324")).await.unwrap(),
            "volcano"
        );
        let deltas: Vec<_> = router
            .complete_streaming(request("qwen-max"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(deltas, vec![Ok("qwen".to_string())]);
        assert_eq!(
            router.providers(),
            vec![ModelProvider::Volcano, ModelProvider::Qwen]
        );
    }

    #[tokio::test]
    async fn router_reports_unconfigured_provider() {
        let router = ProviderRouter::new().with(ModelProvider::Volcano, Arc::new(Named("v")));
        assert_eq!(
            router.complete(request("deepseek-chat")).await,
            Err(TransportError::Unconfigured(ModelProvider::DeepSeek))
        );
        assert!(router.complete_streaming(request("gemini-pro")).await.is_err());
    }
}
