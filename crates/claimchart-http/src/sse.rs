//! Decoding of OpenAI-style `text/event-stream` chat-completion bodies.

use std::collections::VecDeque;
use std::pin::Pin;

use claimchart_ai::{DeltaStream, TransportError};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;

const DONE_MARKER: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental line decoder. Bytes are buffered until a full line arrives,
/// so multi-byte characters split across network chunks survive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns the content deltas completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, TransportError> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut deltas)?;
        }
        Ok(deltas)
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Vec<String>, TransportError> {
        let mut deltas = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut deltas)?;
        }
        Ok(deltas)
    }

    fn decode_line(&mut self, line: &[u8], deltas: &mut Vec<String>) -> Result<(), TransportError> {
        if self.done {
            return Ok(());
        }
        let line = std::str::from_utf8(line)
            .map_err(|e| TransportError::Decode(format!("invalid UTF-8 in stream: {e}")))?;
        let line = line.trim_end_matches(['\r', '\n']);

        // Blank lines, comments and other SSE fields carry no content.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }
        if data == DONE_MARKER {
            debug!("stream done marker received");
            self.done = true;
            return Ok(());
        }

        let chunk: StreamChunk =
            serde_json::from_str(data).map_err(|e| TransportError::from(ClientError::Json(e)))?;
        if let Some(error) = chunk.error {
            return Err(TransportError::Decode(format!("error in stream: {error}")));
        }
        deltas.extend(
            chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .filter(|content| !content.is_empty()),
        );
        Ok(())
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Adapt a byte stream into a stream of content deltas.
///
/// Reading stops after `[DONE]` or the first error.
pub fn delta_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished {
                return None;
            }

            let decoded = match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.push(bytes.as_ref()),
                Some(Err(e)) => Err(TransportError::from(e.into())),
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };
            match decoded {
                Ok(deltas) => state.pending.extend(deltas),
                Err(e) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
            if state.decoder.is_done() {
                state.finished = true;
            }
        }
    })
    .boxed()
}
