//! Prompt template rendering.

use crate::config::{CONTEXT_PLACEHOLDER, ConfigError, QUESTION_PLACEHOLDER};
use crate::documents::ScoredChunk;

/// Separator between chunk texts in the context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// A validated template with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

/// Result of rendering a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub text: String,
    /// How many of the retrieved chunks made it into the context (best first).
    pub chunks_used: usize,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render with retrieved chunks, best first.
    ///
    /// Context is capped at `budget_chars` characters. Lowest-ranked chunks are
    /// dropped first; if even the best chunk does not fit it is truncated.
    pub fn render(&self, question: &str, chunks: &[ScoredChunk], budget_chars: usize) -> RenderedPrompt {
        let (context, chunks_used) = build_context(chunks, budget_chars);
        RenderedPrompt {
            text: self.fill(&context, question),
            chunks_used,
        }
    }

    /// Substitute placeholders in one pass, so substituted text is never rescanned.
    fn fill(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        loop {
            let next_context = rest.find(CONTEXT_PLACEHOLDER);
            let next_question = rest.find(QUESTION_PLACEHOLDER);
            let (pos, placeholder, value) = match (next_context, next_question) {
                (Some(c), Some(q)) if c < q => (c, CONTEXT_PLACEHOLDER, context),
                (_, Some(q)) => (q, QUESTION_PLACEHOLDER, question),
                (Some(c), None) => (c, CONTEXT_PLACEHOLDER, context),
                (None, None) => break,
            };
            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + placeholder.len()..];
        }

        out.push_str(rest);
        out
    }
}

fn build_context(chunks: &[ScoredChunk], budget_chars: usize) -> (String, usize) {
    let separator_len = CONTEXT_SEPARATOR.chars().count();
    let mut used = 0;
    let mut total = 0;

    for (i, scored) in chunks.iter().enumerate() {
        let extra = scored.chunk.char_count() + if i > 0 { separator_len } else { 0 };
        if total + extra > budget_chars {
            break;
        }
        total += extra;
        used += 1;
    }

    if used == 0 {
        return match chunks.first() {
            Some(best) if budget_chars > 0 => (
                best.chunk.content.chars().take(budget_chars).collect(),
                1,
            ),
            _ => (String::new(), 0),
        };
    }

    let context = chunks[..used]
        .iter()
        .map(|scored| scored.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    (context, used)
}
