//! # docchat core
//!
//! Shared, runtime-agnostic logic for docchat: data models, segment
//! chunking, the in-memory vector index, the prompt template, and the
//! answer engine that ties retrieval to a completion provider.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Embedding
//! and completion backends are reached through the [`embedding::Embedder`]
//! and [`completion::CompletionProvider`] traits, implemented by the
//! application crate (or by test stubs).
//!
//! ```text
//! segments ──▶ chunk ──▶ VectorIndex::build ──▶ AnswerEngine::answer
//!                          (Embedder)            (search + prompt + CompletionProvider)
//! ```

pub mod answer;
pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod prompt;
