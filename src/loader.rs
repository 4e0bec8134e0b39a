//! Document loading: format-specific text extraction with page provenance.
//!
//! This is the only format-specific code in the crate. New formats plug in
//! here without touching the chunking or indexing stages.
//!
//! Supported formats:
//!
//! - **PDF** — extracted with `pdf-extract`; pages are split on the form
//!   feeds (`\x0c`) the extractor emits as page separators.
//! - **DOCX** — `word/document.xml` is pulled out of the ZIP archive and
//!   paragraph text collected from `<w:t>` runs; the result is windowed
//!   into synthetic pages so long files still get page-level citations.
//! - **Spreadsheets** (`.xlsx`, `.xls`, `.ods`) — read with `calamine`;
//!   each sheet becomes one page of `|`-delimited rows.
//! - **Plain text / Markdown** (`.txt`, `.md`) — treated as paginated text
//!   when form feeds are present, otherwise a single page.
//!
//! Legacy `.doc` is not supported: converting it requires an external
//! LibreOffice binary, which this crate does not shell out to.

use std::io::Read;
use std::path::Path;

use calamine::Reader;
use tracing::{debug, warn};

use crate::document::{Document, Page};
use crate::error::{RagError, Result};

/// Load a document from a file path, dispatching on the file extension.
///
/// The document id is the file name (not the full path), matching the
/// identity used for citations and re-ingestion.
///
/// # Errors
///
/// Returns [`RagError::Load`] for unreadable files or unsupported
/// extensions.
pub fn load_path(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RagError::Load {
            source_id: path.display().to_string(),
            message: "path has no file name".to_string(),
        })?
        .to_string();

    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => load_pdf(path, &id),
        Some("docx") => load_docx(path, &id),
        Some("xlsx") | Some("xls") | Some("ods") => load_xlsx(path, &id),
        Some("txt") | Some("md") => load_text(path, &id),
        other => Err(RagError::Load {
            source_id: id,
            message: match other {
                Some(ext) => format!("unsupported file type '.{ext}'"),
                None => "file has no extension".to_string(),
            },
        }),
    }
}

/// Extract paginated text from a PDF file.
fn load_pdf(path: &Path, id: &str) -> Result<Document> {
    let raw = pdf_extract::extract_text(path).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("PDF extraction failed: {e}"),
    })?;

    let pages = paginate(&raw);
    if pages.is_empty() {
        warn!(document.id = id, "PDF produced no extractable text");
    } else {
        debug!(document.id = id, page_count = pages.len(), "loaded PDF");
    }
    Ok(Document::from_pages(id, pages))
}

/// Synthetic page size for DOCX text, which has no intrinsic pagination.
const DOCX_PAGE_CHARS: usize = 1500;

/// Extract paragraph text from a DOCX file and window it into pages.
fn load_docx(path: &Path, id: &str) -> Result<Document> {
    let file = std::fs::File::open(path).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("open failed: {e}"),
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("not a DOCX archive: {e}"),
    })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| RagError::Load {
            source_id: id.to_string(),
            message: "DOCX is missing word/document.xml".to_string(),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::Load {
            source_id: id.to_string(),
            message: format!("failed to read word/document.xml: {e}"),
        })?;

    let paragraphs = docx_paragraphs(&xml).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("DOCX XML parse failed: {e}"),
    })?;

    let pages = window_pages(&paragraphs.join("\n\n"), DOCX_PAGE_CHARS);
    debug!(document.id = id, page_count = pages.len(), "loaded DOCX");
    Ok(Document::from_pages(id, pages))
}

/// Collect paragraph text from WordprocessingML: `<w:t>` runs accumulate
/// into the current paragraph, which closes at `</w:p>`. Table cell text
/// comes along for free since cells hold ordinary paragraphs.
fn docx_paragraphs(xml: &str) -> std::result::Result<Vec<String>, quick_xml::Error> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim().to_string();
                    current.clear();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph);
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if in_text {
                    if let Ok(text) = e.unescape() {
                        current.push_str(&text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Window unpaginated text into pages of at most `page_chars` characters.
fn window_pages(text: &str, page_chars: usize) -> Vec<Page> {
    let mut pages = Vec::new();
    let mut rest = text;
    let mut number = 1u32;

    while !rest.is_empty() {
        let end = rest.char_indices().nth(page_chars).map_or(rest.len(), |(i, _)| i);
        let normalized = normalize_whitespace(&rest[..end]);
        if !normalized.is_empty() {
            pages.push(Page { number, text: normalized });
        }
        number += 1;
        rest = &rest[end..];
    }

    pages
}

/// Read a spreadsheet, one sheet per page.
fn load_xlsx(path: &Path, id: &str) -> Result<Document> {
    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("spreadsheet open failed: {e}"),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().iter().map(|s| s.to_string()).collect();
    let mut pages = Vec::with_capacity(sheet_names.len());
    for (i, name) in sheet_names.iter().enumerate() {
        let range = workbook.worksheet_range(name).map_err(|e| RagError::Load {
            source_id: id.to_string(),
            message: format!("sheet '{name}' unreadable: {e}"),
        })?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .filter(|cell| !matches!(cell, calamine::Data::Empty))
                    .map(|cell| cell.to_string())
                    .collect()
            })
            .collect();
        pages.push(sheet_page((i + 1) as u32, name, &rows));
    }

    debug!(document.id = id, page_count = pages.len(), "loaded spreadsheet");
    Ok(Document::from_pages(id, pages))
}

/// Render one sheet as a page: a `Sheet:` header line, then each non-empty
/// row's cells joined with ` | `.
fn sheet_page(number: u32, name: &str, rows: &[Vec<String>]) -> Page {
    let mut lines = vec![format!("Sheet: {name}")];
    lines.extend(rows.iter().filter(|r| !r.is_empty()).map(|r| r.join(" | ")));
    Page { number, text: normalize_whitespace(&lines.join("\n\n")) }
}

/// Read a text or markdown file, splitting on form feeds when present.
fn load_text(path: &Path, id: &str) -> Result<Document> {
    let raw = std::fs::read_to_string(path).map_err(|e| RagError::Load {
        source_id: id.to_string(),
        message: format!("read failed: {e}"),
    })?;

    Ok(Document::from_pages(id, paginate(&raw)))
}

/// Split raw extracted text on form-feed page separators and normalize
/// each page. Pages with no text after normalization are dropped, but page
/// numbering still reflects the source position.
fn paginate(raw: &str) -> Vec<Page> {
    raw.split('\x0c')
        .enumerate()
        .filter_map(|(i, page_text)| {
            let text = normalize_whitespace(page_text);
            if text.is_empty() { None } else { Some(Page { number: (i + 1) as u32, text }) }
        })
        .collect()
}

/// Collapse runs of whitespace into single spaces, keeping blank-line
/// paragraph breaks as `\n\n` so the chunker can use them as split points.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, paragraph) in text.split("\n\n").enumerate() {
        let collapsed = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }
        if i > 0 && !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&collapsed);
    }
    out
}
