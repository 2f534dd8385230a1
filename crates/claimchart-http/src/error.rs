use claimchart_ai::{RetrievalError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
}

impl From<ClientError> for TransportError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(e) if e.is_decode() => TransportError::Decode(e.to_string()),
            ClientError::Http(e) => TransportError::Network(e.to_string()),
            ClientError::Server { status, body } => TransportError::Server { status, body },
            ClientError::Json(e) => TransportError::Decode(e.to_string()),
            e @ ClientError::Api { .. } => TransportError::Decode(e.to_string()),
        }
    }
}

impl From<ClientError> for RetrievalError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Server { status, body } => RetrievalError::Server { status, body },
            e => RetrievalError::Request(e.to_string()),
        }
    }
}

/// Turn a non-success response into [`ClientError::Server`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Server {
        status: status.as_u16(),
        body,
    })
}
