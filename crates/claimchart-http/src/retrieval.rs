//! RAGFlow retrieval client.

use std::time::Duration;

use async_trait::async_trait;
use claimchart_ai::{DocumentRetrieval, RetrievalError, RetrievedChunk};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClientError, check_status};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    question: &'a str,
    dataset_ids: &'a [String],
    top_k: usize,
}

#[derive(Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<RetrievalData>,
}

#[derive(Deserialize)]
struct RetrievalData {
    #[serde(default)]
    chunks: Vec<RetrievedChunk>,
}

/// Parse a retrieval response body, keeping at most `top_k` chunks.
///
/// RAGFlow reports failures as a non-zero `code` inside a 200 response.
pub fn parse_retrieval(body: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, ClientError> {
    let response: RetrievalResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(ClientError::Api {
            code: response.code,
            message: response.message.unwrap_or_default(),
        });
    }
    let mut chunks = response.data.map(|d| d.chunks).unwrap_or_default();
    chunks.truncate(top_k);
    Ok(chunks)
}

pub struct RagflowClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RagflowClient {
    /// `base_url` is the RAGFlow server root, e.g. `http://localhost:81`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch(
        &self,
        query: &str,
        dataset_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, ClientError> {
        let url = format!("{}/api/v1/retrieval", self.base_url);
        info!(url = %url, datasets = dataset_ids.len(), top_k, "retrieving documents");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&RetrievalRequest {
                question: query,
                dataset_ids,
                top_k,
            })
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        let chunks = parse_retrieval(&body, top_k)?;
        info!(count = chunks.len(), "retrieved documents");
        Ok(chunks)
    }
}

#[async_trait]
impl DocumentRetrieval for RagflowClient {
    async fn retrieve(
        &self,
        query: &str,
        dataset_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        Ok(self.fetch(query, dataset_ids, top_k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_ragflow_field_names() {
        let ids = vec!["ds1".to_string()];
        let value = serde_json::to_value(RetrievalRequest {
            question: "处理器",
            dataset_ids: &ids,
            top_k: 5,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"question": "处理器", "dataset_ids": ["ds1"], "top_k": 5})
        );
    }

    #[test]
    fn parses_chunks_and_truncates() {
        let body = r#"{
            "code": 0,
            "data": {
                "chunks": [
                    {"content": "一", "similarity": 0.9, "document_keyword": "CN1.pdf"},
                    {"content": "二", "similarity": 0.8},
                    {"content": "三", "similarity": 0.7}
                ],
                "total": 3
            }
        }"#;
        let chunks = parse_retrieval(body, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source, "CN1.pdf");
        assert_eq!(chunks[1].source, "未知来源");
        assert_eq!(chunks[1].score, 0.8);
    }

    #[test]
    fn missing_data_is_empty() {
        assert!(parse_retrieval(r#"{"code": 0}"#, 5).unwrap().is_empty());
    }

    #[test]
    fn nonzero_code_is_an_error() {
        let err = parse_retrieval(r#"{"code": 102, "message": "You don't own the dataset."}"#, 5)
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { code: 102, .. }));
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = RagflowClient::new("http://localhost:81/", "key").unwrap();
        assert_eq!(client.base_url, "http://localhost:81");
    }
}
