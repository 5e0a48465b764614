//! The fixed question-answering prompt template.
//!
//! The template has two placeholders, `{context}` and `{question}`. The
//! context block is the retrieved segments' text in retrieval order, each
//! preceded by a bracketed source annotation built from its metadata.

use crate::models::{TextSegment, META_CHUNK, META_PAGE, META_SHEET, META_SOURCE};

/// Answer-structure headings the model is asked to produce.
pub const SECTION_SUMMARY: &str = "Summary";
pub const SECTION_STEPS: &str = "Detailed steps";
pub const SECTION_NOTES: &str = "Additional notes";

pub const QA_TEMPLATE: &str = "You are an assistant specialised in technical documentation. \
Answer with precise, well-structured information based only on the documents provided below. \
If the documents do not contain the information needed, say that you have no data on it \
instead of inventing an answer.\n\n\
### Context ###\n{context}\n\n\
### Question ###\n{question}\n\n\
### Structured answer ###\n\
1. **Summary:** A brief explanation of the answer.\n\
2. **Detailed steps:** Each necessary step, explained clearly and concisely.\n\
3. **Additional notes:** Extra information, warnings, or optional settings.";

/// Render the source annotation for one segment, e.g. `[source: a.pdf, page: 2]`.
pub fn source_label(segment: &TextSegment) -> Option<String> {
    let parts: Vec<String> = [META_SOURCE, META_PAGE, META_SHEET, META_CHUNK]
        .iter()
        .filter_map(|key| {
            segment
                .metadata
                .get(*key)
                .map(|value| format!("{}: {}", key, value))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(format!("[{}]", parts.join(", ")))
    }
}

/// Concatenate retrieved segments, in order, into the context block.
pub fn build_context(segments: &[TextSegment]) -> String {
    segments
        .iter()
        .map(|seg| match source_label(seg) {
            Some(label) => format!("{}\n{}", label, seg.content.trim()),
            None => seg.content.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the template with the context block and the verbatim question.
pub fn build_prompt(segments: &[TextSegment], question: &str) -> String {
    // Substitute the question last so braces inside document text stay literal.
    let (head, tail) = QA_TEMPLATE
        .split_once("{question}")
        .unwrap_or((QA_TEMPLATE, ""));
    let head = head.replacen("{context}", &build_context(segments), 1);
    format!("{}{}{}", head, question, tail)
}
