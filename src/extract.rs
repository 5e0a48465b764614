//! Format-specific text extractors (PDF, TXT, XLSX, DOCX).
//!
//! Each extractor turns one [`UploadedFile`] into ordered [`TextSegment`]s
//! tagged with source metadata. Extraction works on the in-memory bytes;
//! nothing is written to disk. Extractors return errors rather than
//! panicking, and the loader skips the file.

use std::io::Read;

use docchat_core::models::{TextSegment, UploadedFile, META_PAGE, META_SHEET, META_SHEET_INDEX};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Separator placed between cells of one spreadsheet row.
const CELL_SEPARATOR: &str = " | ";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    #[error("text decoding failed: {0}")]
    Text(String),

    #[error("extractor panicked: {0}")]
    Panicked(String),
}

/// Turns the bytes of one file into text segments.
pub trait Extractor: Send + Sync {
    /// Short human-readable name (e.g. `"pdf"`).
    fn name(&self) -> &str;

    fn extract(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError>;
}

// ============ PDF ============

/// Page-wise PDF text; one segment per non-blank page with its 1-based page number.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&file.bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| TextSegment::new(text.trim(), &file.name).with_meta(META_PAGE, i + 1))
            .collect())
    }
}

// ============ TXT ============

/// Whole file as one segment. Input must be UTF-8; a leading BOM is dropped.
pub struct TxtExtractor;

impl Extractor for TxtExtractor {
    fn name(&self) -> &str {
        "txt"
    }

    fn extract(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError> {
        let text =
            std::str::from_utf8(&file.bytes).map_err(|e| ExtractError::Text(e.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TextSegment::new(text, &file.name)])
    }
}

// ============ DOCX ============

/// Paragraph-wise text of `word/document.xml`, joined into one segment.
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &str {
        "docx"
    }

    fn extract(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError> {
        let mut archive = open_archive(&file.bytes)?;
        let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?
            .ok_or_else(|| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
        let paragraphs = docx_paragraphs(&xml)?;
        if paragraphs.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TextSegment::new(paragraphs.join("\n\n"), &file.name)])
    }
}

/// Paragraph texts in the order their `w:p` elements close.
///
/// Paragraphs may nest (text boxes put whole `w:p` elements inside a run of
/// the enclosing paragraph), so each open paragraph keeps its own buffer.
/// `mc:Fallback` duplicates the preferred `mc:Choice` content and is skipped.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut run_depth = 0usize;
    let mut text_depth = 0usize;
    let mut fallback_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Fallback" => fallback_depth += 1,
                _ if fallback_depth > 0 => {}
                b"p" => open.push(String::new()),
                b"r" => run_depth += 1,
                b"t" => text_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) if run_depth > 0 && fallback_depth == 0 => {
                if let Some(current) = open.last_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => current.push('\t'),
                        b"br" | b"cr" => current.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(te)) if text_depth > 0 && fallback_depth == 0 => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                if let Some(current) = open.last_mut() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"Fallback" => fallback_depth = fallback_depth.saturating_sub(1),
                _ if fallback_depth > 0 => {}
                b"t" => text_depth = text_depth.saturating_sub(1),
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"p" => {
                    if let Some(para) = open.pop() {
                        let para = para.trim();
                        if !para.is_empty() {
                            paragraphs.push(para.to_string());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

// ============ XLSX ============

/// One segment per non-empty worksheet; one line per row, cells joined by ` | `.
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn name(&self) -> &str {
        "xlsx"
    }

    fn extract(&self, file: &UploadedFile) -> Result<Vec<TextSegment>, ExtractError> {
        let mut archive = open_archive(&file.bytes)?;
        let shared_strings = read_shared_strings(&mut archive)?;
        let sheets = list_worksheets(&mut archive)?;

        let mut segments = Vec::new();
        for (idx, sheet) in sheets.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
            let Some(xml) = read_zip_entry_bounded(&mut archive, &sheet.path, MAX_XML_ENTRY_BYTES)?
            else {
                continue;
            };
            let rows = extract_sheet_rows(&xml, &shared_strings)?;
            if rows.is_empty() {
                continue;
            }
            segments.push(
                TextSegment::new(rows.join("\n"), &file.name)
                    .with_meta(META_SHEET, &sheet.name)
                    .with_meta(META_SHEET_INDEX, idx + 1),
            );
        }
        Ok(segments)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SheetRef {
    name: String,
    path: String,
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

/// Read a ZIP entry up to `max_bytes`. Returns `Ok(None)` if the entry is absent.
fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ExtractError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
    };
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(Some(out))
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Shared string table; absent in workbooks holding only numbers.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    let Some(xml) = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?
    else {
        return Ok(Vec::new());
    };
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    // Phonetic runs (<rPh>) repeat the text as a reading guide.
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Worksheets in workbook order, resolved through the workbook relationships.
///
/// Falls back to `xl/worksheets/sheetN.xml` ordering when the workbook
/// part is missing or references nothing resolvable.
fn list_worksheets(archive: &mut Archive<'_>) -> Result<Vec<SheetRef>, ExtractError> {
    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let rels = read_zip_entry_bounded(
        archive,
        "xl/_rels/workbook.xml.rels",
        MAX_XML_ENTRY_BYTES,
    )?;

    if let (Some(workbook), Some(rels)) = (workbook, rels) {
        let targets = parse_relationships(&rels)?;
        let mut sheets = Vec::new();
        for (name, rel_id) in parse_workbook_sheets(&workbook)? {
            if let Some(target) = targets.iter().find(|(id, _)| *id == rel_id).map(|(_, t)| t) {
                let path = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                };
                sheets.push(SheetRef { name, path });
            }
        }
        if !sheets.is_empty() {
            return Ok(sheets);
        }
    }

    let mut paths: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    paths.sort_by_key(|name| sheet_number(name));
    Ok(paths
        .into_iter()
        .map(|path| SheetRef {
            name: format!("Sheet{}", sheet_number(&path)),
            path,
        })
        .collect())
}

fn sheet_number(path: &str) -> u32 {
    path.trim_start_matches("xl/worksheets/sheet")
        .trim_end_matches(".xml")
        .parse::<u32>()
        .unwrap_or(u32::MAX)
}

/// `(sheet name, relationship id)` pairs from `xl/workbook.xml`.
fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>, ExtractError> {
    let mut out = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                    out.push((name, id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// `(Id, Target)` pairs from a relationships part.
fn parse_relationships(xml: &[u8]) -> Result<Vec<(String, String)>, ExtractError> {
    let mut out = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    out.push((id, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Text of each non-empty row of one worksheet.
fn extract_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut rows = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cell_type = String::new();
    let mut cell_value = String::new();
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row_cells.clear(),
                b"c" => {
                    cell_type = attr(&e, b"t").unwrap_or_default();
                    cell_value.clear();
                }
                // <v> holds plain values; <t> holds inline strings inside <is>.
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                cell_value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(text) = resolve_cell(&cell_type, &cell_value, shared_strings) {
                        row_cells.push(text);
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if !row_cells.is_empty() {
                        rows.push(row_cells.join(CELL_SEPARATOR));
                        row_cells.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row_cells.is_empty() {
        rows.push(row_cells.join(CELL_SEPARATOR));
    }
    Ok(rows)
}

fn resolve_cell(cell_type: &str, raw: &str, shared_strings: &[String]) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let text = match cell_type {
        "s" => shared_strings.get(raw.parse::<usize>().ok()?)?.trim().to_string(),
        "b" => (if raw == "1" { "TRUE" } else { "FALSE" }).to_string(),
        _ => raw.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
