//! Prompt builders and JSON extraction from model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap());

const JSON_ONLY: &str = "IMPORTANT: Respond ONLY with valid JSON. No additional text or explanation.";

/// Prompt asking for `n_cards` flashcards in the given style, grounded on `context`.
pub fn flashcard_prompt(context: &str, n_cards: usize, style: &str) -> String {
    format!(
        "You are an expert at writing flashcards for active-recall study.\n\
         Write effective flashcards from the content below.\n\n\
         INSTRUCTIONS:\n\
         1. Write exactly {n_cards} high-quality flashcards\n\
         2. Each card focuses on a single concept or fact\n\
         3. Questions are clear and specific\n\
         4. Answers are accurate and concise\n\
         5. Use the {style} style\n\
         6. Assign a difficulty of easy, medium or hard\n\
         7. Add relevant tags to every card\n\n\
         STYLE GUIDELINES:\n\
         - basic: direct question and answer\n\
         - cloze: a statement with a blank; the answer fills the blank\n\
         - concept: a conceptual question that requires understanding\n\n\
         CONTENT:\n{context}\n\n\
         OUTPUT FORMAT (JSON array):\n\
         [{{\"question\": \"...\", \"answer\": \"...\", \"difficulty\": \"easy|medium|hard\", \"tags\": [\"tag\"]}}]\n\n\
         {JSON_ONLY}"
    )
}

/// Prompt asking the model to grade `user_answer` against `ideal_answer`.
///
/// In strict mode the rubric forbids partial credit.
pub fn grading_prompt(
    question: &str,
    ideal_answer: &str,
    user_answer: &str,
    context: Option<&str>,
    strict: bool,
) -> String {
    let rubric = if strict {
        "STRICT MODE: the answer must contain every essential element of the ideal answer. \
         Do not award partial credit; use only \"correct\" or \"incorrect\"."
    } else {
        "Accept answers that convey the same meaning in different words. \
         Use \"partial\" when the core idea is present but details are missing."
    };
    let context = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("\nSOURCE CONTEXT:\n{c}\n"))
        .unwrap_or_default();
    format!(
        "You are a teacher grading a student's answer to a flashcard.\n\n\
         QUESTION: {question}\n\
         IDEAL ANSWER: {ideal_answer}\n\
         STUDENT ANSWER: {user_answer}\n\
         {context}\n\
         RUBRIC:\n\
         - correct (score 0.8-1.0): right, or right with minor omissions\n\
         - partial (score 0.4-0.7): partly right, core idea present\n\
         - incorrect (score 0.0-0.3): wrong or irrelevant\n\
         {rubric}\n\n\
         Also give an SM-2 recall quality from 0 (blackout) to 5 (perfect recall).\n\n\
         OUTPUT FORMAT (JSON):\n\
         {{\"verdict\": \"correct|partial|incorrect\", \"score\": 0.85, \"quality\": 4, \"feedback\": \"...\"}}\n\n\
         {JSON_ONLY}"
    )
}

/// Prompt asking for one guiding question after a wrong answer. The model is
/// told not to reveal the answer.
pub fn follow_up_prompt(question: &str, user_answer: &str, feedback: &str) -> String {
    format!(
        "You are a teacher using the Socratic method to help a student learn.\n\
         The student answered the question below incorrectly. Ask one question or \
         give one hint that leads them toward the concept.\n\n\
         QUESTION: {question}\n\
         STUDENT ANSWER: {user_answer}\n\
         PREVIOUS FEEDBACK: {feedback}\n\n\
         INSTRUCTIONS:\n\
         1. Give exactly one guiding question or hint\n\
         2. Focus on understanding the concept, not memorisation\n\
         3. Prefer an open question that prompts reasoning\n\
         4. Do not give the answer away\n\n\
         OUTPUT FORMAT (JSON):\n\
         {{\"follow_up\": \"...\", \"hint_type\": \"conceptual|analytical|practical|comparative\"}}\n\n\
         {JSON_ONLY}"
    )
}

/// Extract the first JSON value starting with `open` (`{` or `[`) from model output.
///
/// Markdown code fences are stripped first. Brackets inside string literals are
/// ignored while matching.
pub fn extract_json(text: &str, open: char) -> Option<Value> {
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };
    let body = FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    // Try each candidate start so prose like "{not json} {...}" still parses.
    for (start, _) in body.match_indices(open) {
        if let Some(end) = matching_close(&body[start..], open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(&body[start..start + end]) {
                return Some(value);
            }
        }
    }
    None
}

/// Byte length of the balanced value at the start of `s`, if it closes.
fn matching_close(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
