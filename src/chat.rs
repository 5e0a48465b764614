//! Interactive terminal front end for a single [`ChatSession`].
//!
//! Each input line is either a slash command or a question:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/upload PATHS...` | Ingest files or directories, replacing the index |
//! | `/history` | Print the conversation so far |
//! | `/warnings` | Print warnings from the latest upload |
//! | `/help` | List commands |
//! | `/quit` | Leave the loop (EOF works too) |
//! | anything else | Ask it as a question |

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::ingest::Ingestor;
use crate::loader::collect_uploads;
use crate::session::ChatSession;

const HELP: &str = "\
Commands:
  /upload PATHS...   upload files or directories (pdf, txt, xlsx, docx)
  /history           show the conversation
  /warnings          show warnings from the last upload
  /help              show this help
  /quit              exit
Anything else is asked as a question about the uploaded documents.";

#[derive(Debug, PartialEq)]
enum ChatCommand {
    Ask(String),
    Upload(Vec<PathBuf>),
    History,
    Warnings,
    Help,
    Quit,
    Unknown(String),
    Blank,
}

fn parse_line(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Blank;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ChatCommand::Ask(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    match parts.next().unwrap_or_default() {
        "upload" => ChatCommand::Upload(parts.map(PathBuf::from).collect()),
        "history" => ChatCommand::History,
        "warnings" => ChatCommand::Warnings,
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    }
}

/// Upload `paths` into `session` and print the outcome.
pub async fn upload<W: Write>(
    session: &mut ChatSession,
    ingestor: &Ingestor,
    paths: &[PathBuf],
    out: &mut W,
) -> Result<bool> {
    let files = match collect_uploads(paths, ingestor.registry()) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            writeln!(out, "No supported files found.")?;
            return Ok(false);
        }
        Err(e) => {
            writeln!(out, "{:#}", e)?;
            return Ok(false);
        }
    };

    let result = session.ingest(ingestor, files).await;
    for warning in session.ingest_warnings() {
        writeln!(out, "warning: {}", warning)?;
    }
    match result {
        Ok(report) => {
            writeln!(
                out,
                "Indexed {} segment(s) from {} file(s).",
                report.segments, report.files
            )?;
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "{}", e.user_message())?;
            Ok(false)
        }
    }
}

/// Run the read-eval loop until `/quit` or end of input.
pub async fn run_chat<R, W>(
    ingestor: &Ingestor,
    initial: &[PathBuf],
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut session = ChatSession::new();
    if !initial.is_empty() {
        upload(&mut session, ingestor, initial, out).await?;
    }
    writeln!(out, "Ask a question, or type /help.")?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ChatCommand::Blank => continue,
            ChatCommand::Quit => break,
            ChatCommand::Help => writeln!(out, "{}", HELP)?,
            ChatCommand::Unknown(cmd) => {
                writeln!(out, "Unknown command /{}. Type /help.", cmd)?
            }
            ChatCommand::Upload(paths) if paths.is_empty() => {
                writeln!(out, "Usage: /upload PATHS...")?
            }
            ChatCommand::Upload(paths) => {
                upload(&mut session, ingestor, &paths, out).await?;
            }
            ChatCommand::History => {
                for message in session.messages() {
                    writeln!(out, "{}: {}", message.role, message.content)?;
                }
            }
            ChatCommand::Warnings => {
                if session.ingest_warnings().is_empty() {
                    writeln!(out, "No warnings.")?;
                }
                for warning in session.ingest_warnings() {
                    writeln!(out, "warning: {}", warning)?;
                }
            }
            ChatCommand::Ask(question) => match session.ask(&question).await {
                Ok(reply) => writeln!(out, "{}", reply.content)?,
                Err(e) => writeln!(out, "{}", e.user_message())?,
            },
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use docchat_core::completion::CompletionProvider;
    use docchat_core::embedding::HashEmbedder;
    use docchat_core::error::GenerationError;

    use super::*;
    use crate::ingest::PipelineSettings;
    use crate::loader::ExtractorRegistry;

    struct FixedCompletion;

    #[async_trait]
    impl CompletionProvider for FixedCompletion {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("1. **Summary:** The sky is blue.".into())
        }
    }

    fn ingestor() -> Ingestor {
        Ingestor::new(
            ExtractorRegistry::with_builtins(),
            Arc::new(HashEmbedder::new(32)),
            Arc::new(FixedCompletion),
            PipelineSettings {
                top_k: 4,
                max_tokens: 1000,
                batch_size: 8,
            },
        )
    }

    async fn transcript(initial: &[PathBuf], input: &str) -> String {
        let mut out = Vec::new();
        run_chat(&ingestor(), initial, input.as_bytes(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lines_parse_into_commands() {
        assert_eq!(parse_line("  "), ChatCommand::Blank);
        assert_eq!(parse_line("/quit"), ChatCommand::Quit);
        assert_eq!(
            parse_line("/upload a.pdf b.txt"),
            ChatCommand::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("b.txt")])
        );
        assert_eq!(
            parse_line("What is this?"),
            ChatCommand::Ask("What is this?".into())
        );
        assert_eq!(parse_line("/nope"), ChatCommand::Unknown("nope".into()));
    }

    #[tokio::test]
    async fn question_before_upload_asks_for_documents() {
        let text = transcript(&[], "hello?\n/quit\n").await;
        assert!(text.contains("Please upload documents first."));
    }

    #[tokio::test]
    async fn upload_then_ask_prints_answer_and_history() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sky = tmp.path().join("sky.txt");
        std::fs::write(&sky, "The sky is blue.").unwrap();

        let input = format!("/upload {}\nWhat color is the sky?\n/history\n", sky.display());
        let text = transcript(&[], &input).await;
        assert!(text.contains("Indexed 1 segment(s) from 1 file(s)."));
        assert!(text.contains("The sky is blue."));
        assert!(text.contains("user: What color is the sky?"));
        assert!(text.contains("assistant: 1. **Summary:**"));
    }

    #[tokio::test]
    async fn unsupported_upload_reports_single_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let csv = tmp.path().join("data.csv");
        std::fs::write(&csv, "a,b\n1,2").unwrap();

        let text = transcript(&[csv], "/warnings\n").await;
        assert_eq!(text.matches("warning: Unsupported format: csv").count(), 2);
        assert!(text.contains("None of the uploaded files contained usable text."));
    }
}
