//! Retrieval-augmented answering.
//!
//! [`AnswerEngine::answer`] retrieves the top-k segments for a question,
//! fills the prompt template, and forwards it to the completion provider.

use std::sync::Arc;

use tracing::{debug, info};

use crate::completion::CompletionProvider;
use crate::error::AnswerError;
use crate::index::{VectorIndex, DEFAULT_TOP_K};
use crate::prompt::build_prompt;

pub struct AnswerEngine {
    completion: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl AnswerEngine {
    pub fn new(completion: Arc<dyn CompletionProvider>, top_k: usize) -> Self {
        Self {
            completion,
            top_k: if top_k == 0 { DEFAULT_TOP_K } else { top_k },
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` from the content of `index`.
    ///
    /// Fails with [`AnswerError::NotReady`] on an empty index; provider
    /// failures come back typed so the caller can decide what to show.
    pub async fn answer(&self, question: &str, index: &VectorIndex) -> Result<String, AnswerError> {
        let retrieved = index.search(question, self.top_k).await?;
        let prompt = build_prompt(&retrieved, question);
        debug!(
            retrieved = retrieved.len(),
            prompt_chars = prompt.len(),
            model = self.completion.model_name(),
            "generating answer"
        );
        let answer = self.completion.generate(&prompt).await?;
        info!(retrieved = retrieved.len(), "answered question");
        Ok(answer)
    }
}
