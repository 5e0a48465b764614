//! Completion provider trait.
//!
//! A completion provider turns a fully assembled prompt into answer text.
//! The OpenAI-compatible implementation lives in the `docchat` crate.

use async_trait::async_trait;

use crate::error::GenerationError;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Generate a response for `prompt`. May block for the full network round trip.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
