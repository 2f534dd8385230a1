//! Streaming judgment session.
//!
//! A session walks `Started -> Streaming* -> Finalizing -> Done`, or jumps to
//! `Done` through a single error event. Each transport chunk is forwarded as
//! its own delta. Dropping the returned stream drops the transport stream
//! with it, so no further chunks are read.

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use claimchart_core::{JudgmentResult, JudgmentStatus};

use crate::error::TransportError;
use crate::parser::ResponseParser;
use crate::transport::{CompletionRequest, DeltaStream, LlmTransport};

/// Event emitted by a streaming judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Delta { content: String },
    Final(JudgmentResult),
    Error { status: JudgmentStatus, message: String },
}

impl StreamEvent {
    fn error(e: &TransportError) -> Self {
        Self::Error {
            status: JudgmentStatus::Error,
            message: e.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta { .. })
    }
}

enum Phase {
    Started {
        transport: Arc<dyn LlmTransport>,
        request: CompletionRequest,
    },
    Streaming {
        deltas: DeltaStream,
        buffer: String,
    },
    Finalizing {
        buffer: String,
    },
    Done,
}

struct Session {
    phase: Phase,
    parser: Arc<dyn ResponseParser>,
    model_id: String,
}

impl Session {
    async fn advance(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Started { transport, request } => {
                    info!(model = %self.model_id, "starting streaming judgment");
                    match transport.complete_streaming(request).await {
                        Ok(deltas) => {
                            self.phase = Phase::Streaming {
                                deltas,
                                buffer: String::new(),
                            };
                        }
                        Err(e) => {
                            warn!(model = %self.model_id, error = %e, "streaming judgment failed to start");
                            return Some(StreamEvent::error(&e));
                        }
                    }
                }
                Phase::Streaming { mut deltas, mut buffer } => match deltas.next().await {
                    Some(Ok(delta)) => {
                        buffer.push_str(&delta);
                        self.phase = Phase::Streaming { deltas, buffer };
                        if !delta.is_empty() {
                            return Some(StreamEvent::Delta { content: delta });
                        }
                    }
                    Some(Err(e)) => {
                        warn!(model = %self.model_id, error = %e, received = buffer.chars().count(), "streaming judgment interrupted");
                        return Some(StreamEvent::error(&e));
                    }
                    None => self.phase = Phase::Finalizing { buffer },
                },
                Phase::Finalizing { buffer } => {
                    if buffer.trim().is_empty() {
                        warn!(model = %self.model_id, "streaming judgment produced no text");
                        return Some(StreamEvent::error(&TransportError::EmptyResponse));
                    }
                    let mut result = self.parser.parse_or_degrade(&buffer);
                    result.model_used = Some(self.model_id.clone());
                    info!(
                        model = %self.model_id,
                        chars = buffer.chars().count(),
                        disclosed = %result.is_disclosed,
                        similarity = result.similarity,
                        "streaming judgment complete"
                    );
                    return Some(StreamEvent::Final(result));
                }
                Phase::Done => return None,
            }
        }
    }
}

/// Run `request` as a streaming judgment and expose it as a lazy event stream.
pub(crate) fn stream_judgment(
    transport: Arc<dyn LlmTransport>,
    request: CompletionRequest,
    parser: Arc<dyn ResponseParser>,
) -> BoxStream<'static, StreamEvent> {
    let session = Session {
        model_id: request.model.id.clone(),
        phase: Phase::Started { transport, request },
        parser,
    };
    stream::unfold(session, |mut session| async move {
        let event = session.advance().await?;
        Some((event, session))
    })
    .boxed()
}
