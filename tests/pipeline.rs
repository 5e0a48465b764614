//! End-to-end pipeline tests: upload → extract → index → answer.
//!
//! Uses the deterministic hashing embedder and a recording completion
//! provider, so no network access is needed.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docchat::core::completion::CompletionProvider;
use docchat::core::embedding::HashEmbedder;
use docchat::core::error::GenerationError;
use docchat::core::models::{ChatRole, UploadedFile};
use docchat::ingest::{IngestError, Ingestor, PipelineSettings};
use docchat::loader::ExtractorRegistry;
use docchat::session::{AskError, ChatSession, SessionState};

/// Records every prompt and answers with a fixed structured reply.
#[derive(Default)]
struct RecordingCompletion {
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompletion {
    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("1. **Summary:** see context\n2. **Steps:** none\n3. **Notes:** none".into())
    }
}

fn setup(top_k: usize) -> (Ingestor, Arc<RecordingCompletion>) {
    let completion = Arc::new(RecordingCompletion::default());
    let ingestor = Ingestor::new(
        ExtractorRegistry::with_builtins(),
        Arc::new(HashEmbedder::new(256)),
        completion.clone(),
        PipelineSettings {
            top_k,
            max_tokens: 1000,
            batch_size: 4,
        },
    );
    (ingestor, completion)
}

fn txt(name: &str, body: &str) -> UploadedFile {
    UploadedFile::new(name, body.as_bytes().to_vec())
}

fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_with(&[("word/document.xml", &xml)])
}

fn xlsx_single_sheet(rows: &[(&str, &str)]) -> Vec<u8> {
    let rows: String = rows
        .iter()
        .map(|(a, b)| {
            format!(
                "<row><c t=\"inlineStr\"><is><t>{}</t></is></c><c><v>{}</v></c></row>",
                a, b
            )
        })
        .collect();
    let sheet = format!("<worksheet><sheetData>{}</sheetData></worksheet>", rows);
    zip_with(&[("xl/worksheets/sheet1.xml", &sheet)])
}

#[tokio::test]
async fn sky_question_is_answered_from_uploaded_text() {
    let (ingestor, completion) = setup(4);
    let mut session = ChatSession::new();
    session
        .ingest(&ingestor, vec![txt("sky.txt", "The sky is blue.")])
        .await
        .unwrap();

    let reply = session.ask("What color is the sky?").await.unwrap();
    assert_eq!(reply.role, ChatRole::Assistant);
    assert!(reply.content.starts_with("1. **Summary:**"));

    let prompt = completion.last_prompt();
    assert!(prompt.contains("The sky is blue."));
    assert!(prompt.contains("What color is the sky?"));
    assert!(prompt.contains("source: sky.txt"));
}

#[tokio::test]
async fn mixed_batch_indexes_every_supported_format() {
    let (ingestor, completion) = setup(10);
    let files = vec![
        txt("notes.txt", "Meeting notes: the launch is in March."),
        UploadedFile::new(
            "policy.docx",
            docx(&["Travel policy", "Economy class for flights under six hours."]),
        ),
        UploadedFile::new(
            "budget.xlsx",
            xlsx_single_sheet(&[("Marketing", "1200"), ("Travel", "800")]),
        ),
        txt("export.csv", "a,b\n1,2"),
    ];

    let mut session = ChatSession::new();
    let report = session.ingest(&ingestor, files).await.unwrap();
    assert_eq!(report.files, 4);
    assert_eq!(report.segments, 3);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("csv"));

    session.ask("What is the travel budget?").await.unwrap();
    let prompt = completion.last_prompt();
    assert!(prompt.contains("Travel | 800"));
    assert!(prompt.contains("sheet: Sheet1"));
    assert!(prompt.contains("Economy class for flights under six hours."));
}

#[tokio::test]
async fn top_k_limits_context_to_closest_segment() {
    let (ingestor, completion) = setup(1);
    let mut session = ChatSession::new();
    session
        .ingest(
            &ingestor,
            vec![
                txt("grass.txt", "Grass is green."),
                txt("sky.txt", "The sky is blue."),
            ],
        )
        .await
        .unwrap();

    session.ask("What color is the sky?").await.unwrap();
    let prompt = completion.last_prompt();
    assert!(prompt.contains("The sky is blue."));
    assert!(!prompt.contains("Grass is green."));
}

#[tokio::test]
async fn asking_before_upload_is_refused() {
    let mut session = ChatSession::new();
    let err = session.ask("Is anything loaded?").await.unwrap_err();
    assert!(matches!(err, AskError::NotReady(_)));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn only_unsupported_files_leaves_session_empty() {
    let (ingestor, _) = setup(4);
    let mut session = ChatSession::new();
    let err = session
        .ingest(&ingestor, vec![txt("data.csv", "a,b\n1,2")])
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NoUsableSegments));
    assert_eq!(session.ingest_warnings().len(), 1);
    assert_eq!(session.state(), SessionState::Empty);
}

#[tokio::test]
async fn same_question_twice_builds_same_prompt() {
    let (ingestor, completion) = setup(2);
    let mut session = ChatSession::new();
    session
        .ingest(
            &ingestor,
            vec![
                txt("a.txt", "Alpha handles billing."),
                txt("b.txt", "Beta handles shipping."),
                txt("c.txt", "Gamma handles support."),
            ],
        )
        .await
        .unwrap();

    session.ask("Who handles shipping?").await.unwrap();
    let first = completion.last_prompt();
    session.ask("Who handles shipping?").await.unwrap();
    let second = completion.last_prompt();
    assert_eq!(first, second);
    assert_eq!(session.messages().len(), 4);
}

#[tokio::test]
async fn corrupt_pdf_is_skipped_and_batch_survives() {
    let (ingestor, _) = setup(4);
    let mut session = ChatSession::new();
    let report = session
        .ingest(
            &ingestor,
            vec![
                UploadedFile::new("broken.pdf", b"%PDF-1.4 truncated".to_vec()),
                txt("ok.txt", "Still indexed."),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.segments, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("broken.pdf"));
}

#[tokio::test]
async fn long_documents_are_chunked_before_indexing() {
    let completion = Arc::new(RecordingCompletion::default());
    let ingestor = Ingestor::new(
        ExtractorRegistry::with_builtins(),
        Arc::new(HashEmbedder::new(64)),
        completion,
        PipelineSettings {
            top_k: 4,
            max_tokens: 10,
            batch_size: 4,
        },
    );
    let body = (0..20)
        .map(|i| format!("Paragraph number {} talks about topic {}.", i, i))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut session = ChatSession::new();
    let report = session
        .ingest(&ingestor, vec![txt("long.txt", &body)])
        .await
        .unwrap();
    assert!(report.segments > 1);
    assert_eq!(session.segment_count(), report.segments);
}
