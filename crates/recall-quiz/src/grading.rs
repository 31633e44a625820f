//! Answer grading: model verdict blended with deterministic rubric checks,
//! keyword-overlap heuristic when the model's output cannot be parsed, and a
//! guiding follow-up question after a wrong answer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use recall_core::{with_deadline, Flashcard, GradingThresholds, Result};
use recall_llm::prompts::{extract_json, follow_up_prompt, grading_prompt};
use recall_llm::Generator;
use recall_review::quality_from_score;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were", "which",
    "with",
];

/// Share of a model grade kept after blending with the rubric.
const MODEL_WEIGHT: f64 = 0.7;

const FOLLOW_UP_MIN_CHARS: usize = 10;

const FEEDBACK_CORRECT: &str = "Your answer covers the key points of the expected answer.";
const FEEDBACK_INCORRECT: &str =
    "Your answer misses key points of the expected answer. Review the answer and its source material.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
}

/// Which path produced a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeSource {
    Model,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grade {
    pub verdict: Verdict,
    /// Always within 0..=5.
    pub quality: u8,
    pub feedback: String,
    /// 0.0-1.0.
    pub score: f64,
    pub source: GradeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintType {
    Conceptual,
    Analytical,
    Practical,
    Comparative,
}

/// A guiding question offered after a wrong answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUp {
    pub question: String,
    pub hint_type: HintType,
}

impl FollowUp {
    /// Read `{"follow_up", "hint_type"}` from model output. Questions shorter
    /// than ten characters are rejected; an unknown hint type reads as
    /// conceptual.
    pub fn parse(raw: &str) -> Option<Self> {
        let Some(Value::Object(obj)) = extract_json(raw, '{') else {
            return None;
        };
        let question = obj.get("follow_up").and_then(Value::as_str)?.trim();
        if question.chars().count() < FOLLOW_UP_MIN_CHARS {
            return None;
        }
        let hint_type = match obj
            .get("hint_type")
            .and_then(Value::as_str)
            .map(|h| h.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("analytical") => HintType::Analytical,
            Some("practical") => HintType::Practical,
            Some("comparative") => HintType::Comparative,
            _ => HintType::Conceptual,
        };
        Some(Self {
            question: question.to_string(),
            hint_type,
        })
    }
}

/// Deterministic checks of an answer against the canonical one, each 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rubric {
    /// Share of canonical keywords the answer mentions.
    pub accuracy: f64,
    /// Answer length relative to the canonical answer, capped at 1.
    pub completeness: f64,
    /// 1.0 when the answer is written in sentences, 0.7 otherwise.
    pub clarity: f64,
    pub relevance: f64,
}

impl Rubric {
    pub fn assess(canonical: &str, user_answer: &str) -> Self {
        let accuracy = keyword_overlap(canonical, user_answer);
        let expected_len = canonical.trim().chars().count().max(1) as f64;
        let completeness = (user_answer.trim().chars().count() as f64 / expected_len).min(1.0);
        let clarity = if user_answer.contains('.') { 1.0 } else { 0.7 };
        Self {
            accuracy,
            completeness,
            clarity,
            relevance: (accuracy * 1.2).min(1.0),
        }
    }

    /// Weighted total: accuracy 0.4, completeness 0.3, clarity 0.2,
    /// relevance 0.1.
    pub fn score(&self) -> f64 {
        0.4 * self.accuracy + 0.3 * self.completeness + 0.2 * self.clarity + 0.1 * self.relevance
    }
}

/// Blend a parsed model grade with the rubric, 70/30.
///
/// Score and quality are both blended; the blended quality decides the
/// verdict, 3 or more being correct.
fn blend(quality: u8, score: f64, rubric: &Rubric) -> (Verdict, u8, f64) {
    let rubric_score = rubric.score();
    let score = MODEL_WEIGHT * score + (1.0 - MODEL_WEIGHT) * rubric_score;
    let score = (score * 100.0).round() / 100.0;
    let quality = (MODEL_WEIGHT * f64::from(quality) + (1.0 - MODEL_WEIGHT) * rubric_score * 5.0)
        .round()
        .clamp(0.0, 5.0) as u8;
    let verdict = if quality >= 3 {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    };
    (verdict, quality, score)
}

/// Outcome of reading the model's grading response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedVerdict {
    Parsed {
        verdict: Verdict,
        quality: u8,
        feedback: String,
        score: f64,
    },
    Unparseable(String),
}

impl ParsedVerdict {
    /// Read `{"verdict", "score", "quality", "feedback"}` from model output.
    ///
    /// `verdict` is required, as is one of `quality` or `score`. A model
    /// quality is clamped to 0..=5 and wins over the score. `partial` counts
    /// as correct when the resulting quality is 3 or more.
    pub fn parse(raw: &str) -> Self {
        let unparseable = || Self::Unparseable(raw.to_string());
        let Some(Value::Object(obj)) = extract_json(raw, '{') else {
            return unparseable();
        };

        let label = match obj.get("verdict").and_then(Value::as_str) {
            Some(v) => v.trim().to_ascii_lowercase(),
            None => return unparseable(),
        };
        let score = obj.get("score").and_then(number).map(|s| s.clamp(0.0, 1.0));
        let model_quality = obj
            .get("quality")
            .and_then(number)
            .map(|q| q.round().clamp(0.0, 5.0) as u8);

        let (quality, score) = match (model_quality, score) {
            (Some(q), Some(s)) => (q, s),
            (Some(q), None) => (q, f64::from(q) / 5.0),
            (None, Some(s)) => (quality_from_score(s), s),
            (None, None) => return unparseable(),
        };

        let verdict = match label.as_str() {
            "correct" => Verdict::Correct,
            "incorrect" => Verdict::Incorrect,
            "partial" if quality >= 3 => Verdict::Correct,
            "partial" => Verdict::Incorrect,
            _ => return unparseable(),
        };
        let feedback = obj
            .get("feedback")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generic_feedback(verdict).to_string());

        Self::Parsed {
            verdict,
            quality,
            feedback,
            score,
        }
    }
}

/// Numbers sometimes arrive as strings ("0.8").
fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn generic_feedback(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Correct => FEEDBACK_CORRECT,
        Verdict::Incorrect => FEEDBACK_INCORRECT,
    }
}

fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn keywords(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Share of `canonical`'s keywords that `user_answer` mentions.
fn keyword_overlap(canonical: &str, user_answer: &str) -> f64 {
    let expected = keywords(canonical);
    if expected.is_empty() {
        return 0.0;
    }
    let given = keywords(user_answer);
    expected.intersection(&given).count() as f64 / expected.len() as f64
}

/// Whether `phrase` occurs in `text` as a run of whole words.
fn contains_phrase(text: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && text.windows(phrase.len()).any(|w| w == phrase)
}

/// Deterministic grade from keyword overlap with the canonical answer.
///
/// Correct when the user's answer contains the canonical answer's words in
/// order, or when the share of canonical keywords it mentions reaches
/// `threshold`. Matching is on whole words, so "14" does not contain "4".
pub fn heuristic_grade(canonical: &str, user_answer: &str, threshold: f64) -> Grade {
    let score = if contains_phrase(&words(user_answer), &words(canonical)) {
        1.0
    } else {
        keyword_overlap(canonical, user_answer)
    };

    let verdict = if score >= threshold {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    };
    Grade {
        verdict,
        quality: if verdict == Verdict::Correct { 4 } else { 2 },
        feedback: generic_feedback(verdict).to_string(),
        score,
        source: GradeSource::Heuristic,
        follow_up: None,
    }
}

/// Grades a user's answer to a flashcard.
pub struct GradingAdjudicator {
    generator: Arc<dyn Generator>,
    thresholds: GradingThresholds,
    timeout: Duration,
}

impl GradingAdjudicator {
    pub fn new(generator: Arc<dyn Generator>, thresholds: GradingThresholds, timeout: Duration) -> Self {
        Self {
            generator,
            thresholds,
            timeout,
        }
    }

    pub async fn grade(&self, card: &Flashcard, user_answer: &str, strict: bool) -> Result<Grade> {
        self.grade_with_context(card, user_answer, None, strict).await
    }

    /// Grade with optional source material shown to the model.
    ///
    /// A failing or timed-out `generate` call is returned as an error; only
    /// an unparseable response falls back to the heuristic. A parsed model
    /// grade is blended with [`Rubric`]. Wrong answers get a follow-up
    /// question when the model can supply one.
    pub async fn grade_with_context(
        &self,
        card: &Flashcard,
        user_answer: &str,
        context: Option<&str>,
        strict: bool,
    ) -> Result<Grade> {
        if user_answer.trim().is_empty() {
            return Ok(Grade {
                verdict: Verdict::Incorrect,
                quality: 0,
                feedback: "No answer was given.".to_string(),
                score: 0.0,
                source: GradeSource::Heuristic,
                follow_up: None,
            });
        }

        let prompt = grading_prompt(&card.question, &card.answer, user_answer, context, strict);
        let raw = with_deadline("generate", self.timeout, self.generator.generate(&prompt)).await?;

        let mut grade = match ParsedVerdict::parse(&raw) {
            ParsedVerdict::Parsed {
                verdict: model_verdict,
                quality: model_quality,
                feedback,
                score: model_score,
            } => {
                let rubric = Rubric::assess(&card.answer, user_answer);
                let (verdict, quality, score) = blend(model_quality, model_score, &rubric);
                debug!(
                    card_id = %card.id,
                    ?model_verdict,
                    model_quality,
                    rubric = rubric.score(),
                    ?verdict,
                    quality,
                    "model grade"
                );
                Grade {
                    verdict,
                    quality,
                    feedback,
                    score,
                    source: GradeSource::Model,
                    follow_up: None,
                }
            }
            ParsedVerdict::Unparseable(raw) => {
                warn!(
                    card_id = %card.id,
                    response_len = raw.len(),
                    "unparseable grading response, using keyword heuristic"
                );
                heuristic_grade(&card.answer, user_answer, self.thresholds.for_mode(strict))
            }
        };

        if grade.verdict == Verdict::Incorrect {
            grade.follow_up = self.follow_up(card, user_answer, &grade.feedback).await;
        }
        Ok(grade)
    }

    /// Ask for a guiding question. Failures are logged and yield `None`; they
    /// never fail the grade.
    async fn follow_up(&self, card: &Flashcard, user_answer: &str, feedback: &str) -> Option<FollowUp> {
        let prompt = follow_up_prompt(&card.question, user_answer, feedback);
        match with_deadline("generate", self.timeout, self.generator.generate(&prompt)).await {
            Ok(raw) => {
                let follow_up = FollowUp::parse(&raw);
                if follow_up.is_none() {
                    debug!(card_id = %card.id, "no usable follow-up question");
                }
                follow_up
            }
            Err(e) => {
                warn!(card_id = %card.id, "follow-up question skipped: {}", e);
                None
            }
        }
    }
}
