//! The fixed question-answering prompt and its `{placeholder}` rendering.

use crate::chunks::Chunk;

/// Prompt sent to the generator for every question. Not user-configurable.
///
/// The model is told to answer only from the context, to say it doesn't know
/// when the context lacks the answer, and to always answer in Brazilian Portuguese.
pub const QA_PROMPT: PromptTemplate = PromptTemplate::new(
    "You are a technical assistant. Answer using only the guide below. \
     Your entire answer must be in Brazilian Portuguese.\n\
     If the answer is not clearly contained in the context, say that you don't know.\n\n\
     Context:\n{context}\n\nQuestion: {question}",
);

/// Text with `{name}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Substitute placeholders in one pass. Values are inserted verbatim and never
    /// re-scanned; braces that don't name a known variable are kept as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .and_then(|close| vars.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, v)));
            match value {
                Some((close, v)) => {
                    out.push_str(v);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Chunk texts in retrieved order, separated by a blank line.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
