//! In-crate fakes for the capability traits.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;

use crate::error::{RetrievalError, TransportError};
use crate::image::ImageEncoder;
use crate::transport::{
    CompletionRequest, DeltaStream, DocumentRetrieval, LlmTransport, RetrievedChunk,
};

/// Transport with a canned reply and a canned chunk sequence.
pub(crate) struct FakeTransport {
    reply: Result<String, TransportError>,
    chunks: Vec<Result<String, TransportError>>,
    stream_error: Option<TransportError>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    /// Chunks pulled from the streaming body so far.
    pub chunks_read: Arc<AtomicUsize>,
    /// Set once the streaming body has been dropped.
    pub stream_dropped: Arc<AtomicBool>,
}

/// Sets its flag when dropped along with the stream that owns it.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl FakeTransport {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            chunks: Vec::new(),
            stream_error: None,
            requests: Mutex::new(Vec::new()),
            chunks_read: Arc::new(AtomicUsize::new(0)),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            reply: Err(error.clone()),
            stream_error: Some(error),
            ..Self::replying("")
        }
    }

    pub fn streaming(chunks: Vec<Result<&str, TransportError>>) -> Self {
        Self {
            chunks: chunks
                .into_iter()
                .map(|c| c.map(str::to_string))
                .collect(),
            ..Self::replying("")
        }
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmTransport for FakeTransport {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone()
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<DeltaStream, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(e) = &self.stream_error {
            return Err(e.clone());
        }
        let guard = DropFlag(Arc::clone(&self.stream_dropped));
        let reads = Arc::clone(&self.chunks_read);
        Ok(stream::iter(self.chunks.clone())
            .map(move |chunk| {
                let _keep = &guard;
                reads.fetch_add(1, Ordering::SeqCst);
                chunk
            })
            .boxed())
    }
}

pub(crate) struct FakeRetrieval {
    result: Result<Vec<RetrievedChunk>, RetrievalError>,
    pub calls: Mutex<Vec<(String, Vec<String>, usize)>>,
}

impl FakeRetrieval {
    pub fn returning(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            result: Ok(chunks),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RetrievalError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentRetrieval for FakeRetrieval {
    async fn retrieve(
        &self,
        query: &str,
        dataset_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), dataset_ids.to_vec(), top_k));
        self.result.clone()
    }
}

/// Encodes any path except ones containing "missing".
pub(crate) struct FakeImages;

#[async_trait]
impl ImageEncoder for FakeImages {
    async fn encode_to_base64(&self, path: &Path) -> Option<String> {
        let name = path.to_string_lossy();
        (!name.contains("missing")).then(|| format!("b64:{name}"))
    }
}
