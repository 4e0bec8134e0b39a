//! Citation resolution: mapping grounding chunks back to (document, page).

use std::collections::HashSet;

use crate::document::{Citation, SearchResult};

/// Produce the deduplicated citation list for the chunks that were
/// included in the grounding context.
///
/// Citations appear in first-appearance order among the retrieved chunks,
/// so the most relevant source leads. Every citation corresponds to a
/// chunk genuinely present in the prompt, and every (document, page) pair
/// used appears exactly once.
pub fn resolve_citations(context: &[SearchResult]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for result in context {
        let citation =
            Citation { document: result.chunk.document_id.clone(), page: result.chunk.page };
        if seen.insert((citation.document.clone(), citation.page)) {
            citations.push(citation);
        }
    }

    citations
}
