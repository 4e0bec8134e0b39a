//! Document chunking with page provenance.
//!
//! This module provides the [`Chunker`] trait and [`SentenceChunker`], which
//! splits a paginated document into overlapping chunks at paragraph and
//! sentence boundaries, never mid-word.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and provenance but no
/// embeddings. Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] if the document has no
    /// extractable text.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Greedy sentence accumulator with overlap.
///
/// Pages are concatenated while retaining page boundaries; each page is
/// split into paragraphs (`\n\n`), then into sentences at `. `, `! `, `? `
/// with the separator kept attached to the preceding sentence. Sentences
/// are accumulated until adding the next one would exceed `chunk_size`,
/// then a chunk is emitted and the next chunk starts with the trailing
/// `chunk_overlap` characters of the emitted chunk to preserve
/// cross-boundary context.
///
/// A single sentence longer than `chunk_size` is emitted within its own
/// oversized chunk rather than split mid-sentence.
///
/// Each chunk records the page number where its first character originates
/// (for an overlapping chunk, the page of the overlap tail's first
/// character).
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

/// A sentence-or-smaller span of text attributed to a single page.
struct Unit {
    text: String,
    page: u32,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum chunk length in bytes of UTF-8 text
    /// * `chunk_overlap` — length of the tail carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Break a document into page-attributed sentence units.
    ///
    /// Paragraph separators stay attached to the preceding sentence and a
    /// newline joins consecutive pages, so concatenating all unit texts
    /// reconstructs the document text exactly.
    fn units(&self, document: &Document) -> Vec<Unit> {
        let mut units = Vec::new();
        let last_page_idx = document.pages.len().saturating_sub(1);

        for (page_idx, page) in document.pages.iter().enumerate() {
            let paragraphs: Vec<&str> = split_keeping_separator(&page.text, "\n\n");
            for paragraph in paragraphs {
                for sentence in split_sentences(paragraph) {
                    units.push(Unit { text: sentence.to_string(), page: page.number });
                }
            }
            if page_idx != last_page_idx {
                if let Some(last) = units.last_mut() {
                    last.text.push('\n');
                }
            }
        }

        units.retain(|u| !u.text.is_empty());
        units
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.is_blank() {
            return Err(RagError::EmptyDocument(document.id.clone()));
        }

        let units = self.units(document);
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut buffer: Vec<Unit> = Vec::new();
        let mut buffer_len = 0usize;
        let mut seq = 0usize;

        for unit in units {
            if !buffer.is_empty() && buffer_len + unit.text.len() > self.chunk_size {
                let (text, first_page, tail) = flush(&buffer, self.chunk_overlap);
                chunks.push(Chunk::new(&document.id, first_page, seq, text));
                seq += 1;

                buffer.clear();
                buffer_len = 0;
                // Seed the next chunk with the overlap tail, unless the
                // tail plus the incoming sentence would already exceed the
                // budget.
                if let Some(tail) = tail {
                    if tail.text.len() + unit.text.len() <= self.chunk_size {
                        buffer_len += tail.text.len();
                        buffer.push(tail);
                    }
                }
            }
            buffer_len += unit.text.len();
            buffer.push(unit);
        }

        if !buffer.is_empty() {
            let (text, first_page, _) = flush(&buffer, self.chunk_overlap);
            chunks.push(Chunk::new(&document.id, first_page, seq, text));
        }

        Ok(chunks)
    }
}

/// Assemble a chunk from buffered units: the joined text, the page of its
/// first character, and the overlap tail to seed the next chunk.
fn flush(buffer: &[Unit], overlap: usize) -> (String, u32, Option<Unit>) {
    let text: String = buffer.iter().map(|u| u.text.as_str()).collect();
    let first_page = buffer[0].page;

    if overlap == 0 || text.is_empty() {
        return (text, first_page, None);
    }

    let tail_start = ceil_char_boundary(&text, text.len().saturating_sub(overlap));
    if tail_start >= text.len() {
        return (text, first_page, None);
    }

    // Attribute the tail to the page of its first character.
    let mut offset = 0;
    let mut tail_page = first_page;
    for unit in buffer {
        if tail_start < offset + unit.text.len() {
            tail_page = unit.page;
            break;
        }
        offset += unit.text.len();
    }

    let tail = Unit { text: text[tail_start..].to_string(), page: tail_page };
    (text, first_page, Some(tail))
}

/// Split text at sentence-ending punctuation, keeping the punctuation and
/// trailing space attached to the preceding sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') && bytes[i + 1] == b' ' {
            result.push(&text[start..i + 2]);
            start = i + 2;
            i = start;
        } else {
            i += 1;
        }
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Split text at a separator while keeping the separator attached to the
/// preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Round a byte index up to the nearest UTF-8 character boundary.
fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sentences_keeps_separators() {
        let parts = split_sentences("One. Two! Three? Four");
        assert_eq!(parts, vec!["One. ", "Two! ", "Three? ", "Four"]);
    }

    #[test]
    fn split_sentences_ignores_mid_number_periods() {
        // No space after the period, so it is not a sentence boundary.
        let parts = split_sentences("Version 1.5 shipped. Done");
        assert_eq!(parts, vec!["Version 1.5 shipped. ", "Done"]);
    }

    #[test]
    fn blank_document_is_an_error() {
        let chunker = SentenceChunker::new(100, 20);
        let doc = Document::from_text("empty.txt", "   ");
        assert!(matches!(chunker.chunk(&doc).unwrap_err(), RagError::EmptyDocument(_)));
    }

    #[test]
    fn ceil_char_boundary_respects_multibyte() {
        let text = "aé b";
        // Byte 2 is inside 'é'.
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(ceil_char_boundary(text, 1), 1);
    }
}
