//! Assembles retrieved chunks into a prompt context under a token budget.

use crate::retriever::RetrievalResult;

const SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    /// Estimated tokens (words x 1.3) the context may use.
    pub max_tokens: usize,
    /// Longer chunks are cut at a word boundary and end with `...`.
    pub per_chunk_max_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            per_chunk_max_chars: 2000,
        }
    }
}

fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * 1.3
}

fn trim_chunk(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let head = match cut.rfind(' ') {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{}...", head)
}

/// Concatenate retrieved chunks in rank order until the budget would be exceeded.
pub fn build_context(result: &RetrievalResult, budget: ContextBudget) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut used = 0.0;

    for hit in &result.hits {
        let content = trim_chunk(&hit.chunk.text, budget.per_chunk_max_chars);
        let part = match hit.chunk.heading() {
            Some(heading) => format!("## {}\n{}\n", heading, content),
            None => format!("{}\n", content),
        };
        let tokens = estimate_tokens(&part);
        if used + tokens > budget.max_tokens as f64 {
            break;
        }
        used += tokens;
        parts.push(part);
    }

    parts.join(SEPARATOR)
}
