//! Ingestion pipeline: files → segments → vector index → answer engine.
//!
//! [`Ingestor::prepare`] does all the work for one upload batch without
//! touching any session, so a host can run it outside a session lock and
//! swap the result in atomically afterwards.

use std::sync::Arc;

use docchat_core::answer::AnswerEngine;
use docchat_core::chunk::split_segments;
use docchat_core::completion::CompletionProvider;
use docchat_core::embedding::Embedder;
use docchat_core::error::EmbeddingError;
use docchat_core::index::VectorIndex;
use docchat_core::models::UploadedFile;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::completion::OpenAiChat;
use crate::config::{Config, Credentials};
use crate::embedding::create_embedder;
use crate::loader::{DocumentLoader, ExtractorRegistry, LoadOutcome};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no usable text segments in the uploaded files")]
    NoUsableSegments,

    #[error("index build failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("another upload is still being processed")]
    Busy,
}

impl IngestError {
    /// Short, non-technical text for the presentation layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::NoUsableSegments => {
                "None of the uploaded files contained usable text. Upload a PDF, TXT, XLSX or DOCX file."
            }
            IngestError::Embedding(_) => {
                "The documents could not be indexed. Please try uploading them again."
            }
            IngestError::Busy => "Documents are still being processed. Please wait.",
        }
    }
}

/// The per-batch objects a session answers from. Replaced wholesale.
#[derive(Clone)]
pub struct Pipeline {
    pub index: Arc<VectorIndex>,
    pub engine: Arc<AnswerEngine>,
}

/// Everything produced for one upload batch.
pub struct PreparedBatch {
    pub files: usize,
    pub warnings: Vec<String>,
    pub outcome: Result<Pipeline, IngestError>,
}

/// Summary returned to callers after a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub segments: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub max_tokens: usize,
    pub batch_size: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_tokens: config.chunking.max_tokens,
            batch_size: config.embedding.batch_size,
        }
    }
}

/// Shared, stateless ingestion machinery (loader plus providers).
pub struct Ingestor {
    loader: Arc<DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn CompletionProvider>,
    settings: PipelineSettings,
}

impl Ingestor {
    pub fn new(
        registry: ExtractorRegistry,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            loader: Arc::new(DocumentLoader::new(Arc::new(registry))),
            embedder,
            completion,
            settings,
        }
    }

    /// Built-in formats, the configured embedder, and the OpenAI chat model.
    pub fn from_config(config: &Config, credentials: &Credentials) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding, credentials)?;
        let completion: Arc<dyn CompletionProvider> =
            Arc::new(OpenAiChat::new(&config.completion, credentials)?);
        Ok(Self::new(
            ExtractorRegistry::with_builtins(),
            embedder,
            completion,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        self.loader.registry()
    }

    /// Load, split, embed, and index one batch of files.
    ///
    /// Extraction runs on a blocking thread. A batch with no usable
    /// segments fails with [`IngestError::NoUsableSegments`] instead of
    /// producing an empty index.
    pub async fn prepare(&self, files: Vec<UploadedFile>) -> PreparedBatch {
        let file_count = files.len();
        let loader = self.loader.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&files))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "document loading task failed");
                LoadOutcome {
                    segments: Vec::new(),
                    warnings: vec!["Document loading was interrupted.".to_string()],
                }
            });

        let segments = split_segments(loaded.segments, self.settings.max_tokens);
        if segments.is_empty() {
            return PreparedBatch {
                files: file_count,
                warnings: loaded.warnings,
                outcome: Err(IngestError::NoUsableSegments),
            };
        }

        let segment_count = segments.len();
        let outcome =
            match VectorIndex::build(self.embedder.clone(), segments, self.settings.batch_size)
                .await
            {
                Ok(index) => {
                    info!(
                        files = file_count,
                        segments = segment_count,
                        model = index.model_name(),
                        "indexed upload batch"
                    );
                    Ok(Pipeline {
                        index: Arc::new(index),
                        engine: Arc::new(AnswerEngine::new(
                            self.completion.clone(),
                            self.settings.top_k,
                        )),
                    })
                }
                Err(e) => {
                    warn!(error = %e, "embedding failed; keeping previous index");
                    Err(IngestError::Embedding(e))
                }
            };

        PreparedBatch {
            files: file_count,
            warnings: loaded.warnings,
            outcome,
        }
    }
}
