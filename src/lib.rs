//! # docchat
//!
//! Chat with your documents. Upload PDF, TXT, XLSX, or DOCX files; docchat
//! extracts their text, embeds it into an in-memory vector index, and
//! answers questions from the most relevant passages using an
//! OpenAI-compatible chat model and a fixed structured-answer prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ DocumentLoader│──▶│ VectorIndex │──▶│ AnswerEngine │
//! │ pdf/txt/ │   │ + chunking   │   │ (embedder)  │   │ (completion) │
//! │ xlsx/docx│   └──────────────┘   └─────────────┘   └──────┬───────┘
//! └──────────┘                                               │
//!                        ┌───────────────────────────────────┤
//!                        ▼                                   ▼
//!                   ┌──────────┐                        ┌──────────┐
//!                   │   CLI    │                        │   HTTP   │
//!                   │  (chat)  │                        │(sessions)│
//!                   └──────────┘                        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! docchat chat ./docs                         # interactive
//! docchat ask --question "Who signed?" a.pdf  # one-shot
//! docchat serve                               # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`extract`] | Per-format text extractors |
//! | [`loader`] | Extension dispatch and upload collection |
//! | [`embedding`] | OpenAI embedding provider |
//! | [`completion`] | OpenAI chat completion provider |
//! | [`ingest`] | Upload batch → index + answer engine |
//! | [`session`] | Chat session state machine |
//! | [`chat`] | Interactive terminal loop |
//! | [`server`] | Multi-session HTTP server |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! Format-independent pieces (models, chunking, index, prompt, answer
//! engine) live in the `docchat-core` crate and are re-exported as
//! [`core`].

pub use docchat_core as core;

pub mod chat;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod server;
pub mod session;
