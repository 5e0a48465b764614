//! Document loading: extension → extractor dispatch.
//!
//! [`ExtractorRegistry`] maps lower-cased file extensions to
//! [`Extractor`]s; new formats are added with
//! [`register`](ExtractorRegistry::register) without touching dispatch.
//! [`DocumentLoader::load`] runs a batch of files through the registry and
//! collects user-facing warnings for every file it had to skip.
//!
//! | Extension | Extractor | Segments |
//! |-----------|-----------|----------|
//! | `pdf` | [`PdfExtractor`] | one per page |
//! | `txt` | [`TxtExtractor`] | one per file |
//! | `xlsx` | [`XlsxExtractor`] | one per sheet |
//! | `docx` | [`DocxExtractor`] | one per file |

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use docchat_core::models::{TextSegment, UploadedFile};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::extract::{
    DocxExtractor, ExtractError, Extractor, PdfExtractor, TxtExtractor, XlsxExtractor,
};

/// Extension → extractor table.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in formats: pdf, txt, xlsx, docx.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("pdf", Arc::new(PdfExtractor));
        registry.register("txt", Arc::new(TxtExtractor));
        registry.register("xlsx", Arc::new(XlsxExtractor));
        registry.register("docx", Arc::new(DocxExtractor));
        registry
    }

    /// Add or replace the extractor for `extension` (matched case-insensitively).
    pub fn register(&mut self, extension: &str, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(extension.trim_start_matches('.').to_lowercase(), extractor);
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&extension.to_lowercase()).cloned()
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extractors.contains_key(&extension.to_lowercase())
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.extractors.keys().cloned().collect();
        exts.sort();
        exts
    }
}

/// Result of loading one batch: segments in upload order plus warnings.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub segments: Vec<TextSegment>,
    pub warnings: Vec<String>,
}

pub struct DocumentLoader {
    registry: Arc<ExtractorRegistry>,
}

impl DocumentLoader {
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Extract every file in order. Unsupported, unreadable, or empty files
    /// are skipped with one warning each; the rest of the batch continues.
    pub fn load(&self, files: &[UploadedFile]) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        for file in files {
            match self.load_one(file) {
                Ok(segments) if segments.is_empty() => {
                    warn!(file = %file.name, "no extractable text");
                    outcome
                        .warnings
                        .push(format!("No extractable text found in {}.", file.name));
                }
                Ok(segments) => {
                    debug!(file = %file.name, segments = segments.len(), "extracted file");
                    outcome.segments.extend(segments);
                }
                Err(ExtractError::UnsupportedFormat(ext)) => {
                    warn!(file = %file.name, extension = %ext, "unsupported format");
                    let shown = if ext.is_empty() { "(none)" } else { ext.as_str() };
                    outcome.warnings.push(format!(
                        "Unsupported format: {} ({} was skipped).",
                        shown, file.name
                    ));
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "extraction failed");
                    outcome.warnings.push(format!(
                        "Could not read {}; the file was skipped.",
                        file.name
                    ));
                }
            }
        }
        outcome
    }

    fn load_one(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError> {
        let extractor = self
            .registry
            .get(&file.extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(file.extension.clone()))?;
        // Third-party parsers may panic on malformed input; contain it to this file.
        catch_unwind(AssertUnwindSafe(|| extractor.extract(file))).unwrap_or_else(|panic| {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ExtractError::Panicked(msg))
        })
    }
}

/// Read a file from disk into an [`UploadedFile`] named after its file name.
pub fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(name, bytes))
}

/// Expand `paths` into uploads, in the order given.
///
/// Files are taken as-is (unsupported ones are reported by the loader).
/// Directories are walked recursively, sorted by name, keeping only files
/// with an extension the registry supports.
pub fn collect_uploads(paths: &[PathBuf], registry: &ExtractorRegistry) -> Result<Vec<UploadedFile>> {
    let mut uploads = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let ext = docchat_core::models::extension_of(&entry.file_name().to_string_lossy());
                if registry.supports(&ext) {
                    uploads.push(read_upload(entry.path())?);
                }
            }
        } else {
            uploads.push(read_upload(path)?);
        }
    }
    Ok(uploads)
}
