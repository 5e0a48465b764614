//! Core data models used throughout docchat.
//!
//! These types represent the uploaded files, extracted text segments, and
//! chat messages that flow through the ingestion and answer pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Metadata key holding the originating file name.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the 1-based page number (PDF).
pub const META_PAGE: &str = "page";
/// Metadata key holding the worksheet name (XLSX).
pub const META_SHEET: &str = "sheet";
/// Metadata key holding the 1-based worksheet position (XLSX).
pub const META_SHEET_INDEX: &str = "sheet_index";
/// Metadata key holding the chunk index when a segment was split.
pub const META_CHUNK: &str = "chunk";

/// A file handed to the loader: name plus raw bytes.
///
/// Lives only for one ingestion call. The extension is derived from the
/// name once, at construction.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let extension = extension_of(&name);
        Self {
            name,
            bytes,
            extension,
        }
    }
}

/// Lower-cased substring after the final `.` of a file name.
///
/// Returns an empty string when the name has no dot.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// A unit of extracted document text with its source metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl TextSegment {
    /// Create a segment tagged with its originating file name.
    pub fn new(content: impl Into<String>, source: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), source.to_string());
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// The originating file name, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

/// A segment together with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedSegment {
    pub segment: TextSegment,
    pub vector: Vec<f32>,
}

/// A retrieval hit: the segment and its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSegment {
    pub segment: TextSegment,
    pub score: f32,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the chat history. Never modified after it is appended.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
