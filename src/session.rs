//! Per-user chat session: conversation history plus the active pipeline.
//!
//! A session starts [`Empty`](SessionState::Empty), moves to
//! [`Ingesting`](SessionState::Ingesting) while an upload batch is being
//! indexed, and is [`Ready`](SessionState::Ready) once an index exists.
//! Questions are only answered in the `Ready` state. A failed ingestion
//! leaves the previous pipeline (if any) in place.
//!
//! Ingestion is split into [`begin_ingest`](ChatSession::begin_ingest) and
//! [`finish_ingest`](ChatSession::finish_ingest) so a host that shares the
//! session behind a lock can run [`Ingestor::prepare`] without holding it.

use docchat_core::error::NotReadyError;
use docchat_core::models::{ChatMessage, UploadedFile};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::ingest::{IngestError, IngestReport, Ingestor, Pipeline, PreparedBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Ingesting,
    Ready,
}

#[derive(Debug, Error, PartialEq)]
pub enum AskError {
    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    #[error("question is empty")]
    EmptyQuestion,
}

impl AskError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AskError::NotReady(_) => "Please upload documents first.",
            AskError::EmptyQuestion => "Please enter a question.",
        }
    }
}

#[derive(Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    pipeline: Option<Pipeline>,
    ingesting: bool,
    warnings: Vec<String>,
    last_failure: Option<String>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.ingesting {
            SessionState::Ingesting
        } else if self.pipeline.is_some() {
            SessionState::Ready
        } else {
            SessionState::Empty
        }
    }

    /// Conversation history, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Warnings from the most recent upload batch.
    pub fn ingest_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// User-facing reason the most recent ingestion failed, if it did.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Number of indexed segments in the active pipeline.
    pub fn segment_count(&self) -> usize {
        self.pipeline.as_ref().map_or(0, |p| p.index.len())
    }

    /// Mark the session as ingesting. Fails with [`IngestError::Busy`] if a
    /// batch is already in flight.
    pub fn begin_ingest(&mut self) -> Result<(), IngestError> {
        if self.ingesting {
            return Err(IngestError::Busy);
        }
        self.ingesting = true;
        Ok(())
    }

    /// Apply a prepared batch. On success the pipeline is replaced; on
    /// failure the previous one is kept. Warnings always reflect this batch.
    pub fn finish_ingest(&mut self, batch: PreparedBatch) -> Result<IngestReport, IngestError> {
        self.ingesting = false;
        self.warnings = batch.warnings;
        match batch.outcome {
            Ok(pipeline) => {
                let segments = pipeline.index.len();
                self.pipeline = Some(pipeline);
                self.last_failure = None;
                info!(files = batch.files, segments, "session ready");
                Ok(IngestReport {
                    files: batch.files,
                    segments,
                    warnings: self.warnings.clone(),
                })
            }
            Err(e) => {
                self.last_failure = Some(e.user_message().to_string());
                Err(e)
            }
        }
    }

    /// Leave the ingesting state without a batch, keeping the previous
    /// pipeline. Used when preparation died before producing a result.
    pub fn abort_ingest(&mut self, reason: &str) {
        self.ingesting = false;
        self.last_failure = Some(reason.to_string());
    }

    /// Ingest a batch end to end while holding the session exclusively.
    pub async fn ingest(
        &mut self,
        ingestor: &Ingestor,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport, IngestError> {
        self.begin_ingest()?;
        let batch = ingestor.prepare(files).await;
        self.finish_ingest(batch)
    }

    /// Answer `question` from the active index and append both turns.
    ///
    /// Provider failures still produce an assistant turn carrying a generic
    /// message; the underlying error only goes to the log. A blank question
    /// or a session without an index is rejected and history is unchanged.
    pub async fn ask(&mut self, question: &str) -> Result<ChatMessage, AskError> {
        if question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        let pipeline = match (&self.pipeline, self.ingesting) {
            (Some(p), false) => p.clone(),
            _ => return Err(NotReadyError.into()),
        };

        self.messages.push(ChatMessage::user(question));
        let reply = match pipeline.engine.answer(question, &pipeline.index).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "answer failed");
                e.user_message().to_string()
            }
        };
        let message = ChatMessage::assistant(reply);
        self.messages.push(message.clone());
        Ok(message)
    }
}
