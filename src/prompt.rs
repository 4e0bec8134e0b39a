//! Grounded prompt construction.
//!
//! [`PromptBuilder`] assembles a generation request whose context is
//! exactly the retrieved chunks, tagged so citations can be mapped back to
//! (document, page). An ungrounded question is never forwarded: with zero
//! retrieved chunks the prompt instructs the model to state that no
//! relevant information was found.

use crate::document::SearchResult;

/// Default system instructions: answer from the supplied context only,
/// decline when the context is insufficient.
const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an analyst answering questions about a document collection. \
Answer ONLY using the provided context passages. \
If the answer is not present in the context, say you do not have enough \
information in the indexed documents and do not guess. \
Keep answers concise and specific, with no speculative claims.";

/// A generation request: system instructions plus the user message
/// carrying the grounding context and question.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// System instructions constraining the answer to the context.
    pub system: String,
    /// The user message: tagged context passages followed by the question.
    pub user: String,
}

/// Builds grounded prompts from a question and retrieved chunks.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { system_prompt: DEFAULT_SYSTEM_PROMPT.to_string() }
    }
}

impl PromptBuilder {
    /// Create a builder with the default system instructions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the system instructions.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Build the prompt for a question and its retrieved context.
    ///
    /// Context passages are included verbatim in retrieval-rank order,
    /// each tagged `[S{n}] {document} p.{page}` so the citation resolver
    /// can map them back to their source. With no context, the prompt
    /// instructs the model to state that no relevant information was
    /// found.
    pub fn build(&self, question: &str, context: &[SearchResult]) -> Prompt {
        let user = if context.is_empty() {
            format!(
                "No relevant context was found in the indexed documents.\n\n\
                 Question: {question}\n\n\
                 State that no relevant information was found for this question."
            )
        } else {
            let blocks: Vec<String> = context
                .iter()
                .enumerate()
                .map(|(i, result)| {
                    format!(
                        "[S{n}] {document} p.{page}\n{text}",
                        n = i + 1,
                        document = result.chunk.document_id,
                        page = result.chunk.page,
                        text = result.chunk.text
                    )
                })
                .collect();

            format!("Context:\n{}\n\nQuestion: {question}\n\nAnswer:", blocks.join("\n\n"))
        };

        Prompt { system: self.system_prompt.clone(), user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn result(document: &str, page: u32, text: &str) -> SearchResult {
        SearchResult { chunk: Chunk::new(document, page, 0, text.to_string()), score: 1.0 }
    }

    #[test]
    fn context_blocks_are_tagged_in_rank_order() {
        let builder = PromptBuilder::new();
        let prompt = builder.build(
            "what happened?",
            &[result("a.pdf", 2, "first passage"), result("b.pdf", 1, "second passage")],
        );
        let s1 = prompt.user.find("[S1] a.pdf p.2\nfirst passage").unwrap();
        let s2 = prompt.user.find("[S2] b.pdf p.1\nsecond passage").unwrap();
        assert!(s1 < s2);
        assert!(prompt.user.contains("Question: what happened?"));
    }

    #[test]
    fn empty_context_instructs_not_found() {
        let prompt = PromptBuilder::new().build("anything?", &[]);
        assert!(prompt.user.contains("No relevant context was found"));
        assert!(prompt.user.contains("no relevant information was found"));
    }
}
