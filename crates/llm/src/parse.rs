//! Best-effort parsing of model-written MCQ text.
//!
//! The model is asked for blocks shaped like
//!
//! ```text
//! 1. What is the capital of France?
//! A) Berlin
//! B) Paris
//! C) Rome
//! D) Madrid
//! Answer: B
//! Explanation: The text states that Paris is the capital.
//! ```
//!
//! but real output varies in numbering, option labels and markdown. Blocks
//! missing the question, any of the four options, or the answer are skipped.

use serde::Serialize;
use tracing::{debug, warn};

const LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mcq {
    pub question: String,
    /// Option texts in A, B, C, D order, labels stripped.
    pub options: [String; 4],
    pub answer: char,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Mcq {
    /// Text of the option the answer points at.
    pub fn answer_text(&self) -> &str {
        let idx = LABELS.iter().position(|l| *l == self.answer).unwrap_or(0);
        &self.options[idx]
    }
}

/// How well a response matched the requested count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub requested: u32,
    pub parsed: usize,
    /// Every requested question was parsed and each has an explanation.
    pub complete: bool,
}

#[derive(Default)]
struct Draft {
    question: String,
    options: [Option<String>; 4],
    answer: Option<char>,
    explanation: Option<String>,
}

impl Draft {
    fn has_body(&self) -> bool {
        self.options.iter().any(Option::is_some) || self.answer.is_some()
    }

    fn finish(self) -> Option<Mcq> {
        let [Some(a), Some(b), Some(c), Some(d)] = self.options else {
            return None;
        };
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return None;
        }
        Some(Mcq {
            question,
            options: [a, b, c, d],
            answer: self.answer?,
            explanation: self.explanation,
        })
    }
}

/// Parse every complete MCQ block out of `text`.
pub fn parse_mcqs(text: &str) -> Vec<Mcq> {
    let mut out = Vec::new();
    let mut draft = Draft::default();

    for raw in text.lines() {
        let cleaned = raw.replace("**", "");
        let line = cleaned.trim().trim_start_matches(['-', '*', '#']).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = strip_prefix_ci(line, "correct answer").or_else(|| strip_prefix_ci(line, "answer")) {
            if let Some(letter) = answer_letter(rest) {
                draft.answer = Some(letter);
                continue;
            }
        }

        if let Some(rest) = strip_prefix_ci(line, "explanation") {
            let rest = rest.trim_start().trim_start_matches([':', '-']).trim();
            if !rest.is_empty() {
                draft.explanation = Some(rest.to_string());
            }
            continue;
        }

        if let Some((idx, option)) = option_line(line) {
            if draft.options[idx].is_some() || draft.answer.is_some() {
                out.extend(std::mem::take(&mut draft).finish());
            }
            draft.options[idx] = Some(option.to_string());
            continue;
        }

        // Anything else is question text.
        let (numbered, body) = strip_numbering(line);
        if draft.has_body() {
            out.extend(std::mem::take(&mut draft).finish());
        }
        if numbered || draft.question.is_empty() {
            draft.question = body.to_string();
        } else {
            draft.question.push(' ');
            draft.question.push_str(body);
        }
    }
    out.extend(draft.finish());

    debug!("Parsed {} MCQs", out.len());
    out
}

/// Parse `text` and compare the result with the requested count.
pub fn validate_mcqs(text: &str, requested: u32) -> (Vec<Mcq>, ValidationReport) {
    let mcqs = parse_mcqs(text);
    let complete = mcqs.len() == requested as usize && mcqs.iter().all(|m| m.explanation.is_some());
    let report = ValidationReport {
        requested,
        parsed: mcqs.len(),
        complete,
    };
    if !complete {
        warn!(
            "Model output has {} parseable MCQs for {} requested",
            report.parsed, requested
        );
    }
    (mcqs, report)
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}

fn label_index(c: char) -> Option<usize> {
    LABELS.iter().position(|l| *l == c.to_ascii_uppercase())
}

/// `": B"`, `": (B) Paris"`, `" - b"` → `B`. A word such as `"Because"`
/// does not count as a label.
fn answer_letter(rest: &str) -> Option<char> {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix('-'))?;
    let rest = rest.trim_start().trim_start_matches('(');
    let mut chars = rest.chars();
    let letter = chars.next()?;
    if chars.next().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }
    label_index(letter).map(|i| LABELS[i])
}

/// `A) text`, `A. text`, `A: text`, `(A) text` → (index, text).
fn option_line(line: &str) -> Option<(usize, &str)> {
    let (letter, rest) = if let Some(inner) = line.strip_prefix('(') {
        let mut chars = inner.chars();
        let letter = chars.next()?;
        (letter, chars.as_str().strip_prefix(')')?)
    } else {
        let mut chars = line.chars();
        let letter = chars.next()?;
        let rest = chars.as_str();
        let rest = rest
            .strip_prefix(')')
            .or_else(|| rest.strip_prefix('.'))
            .or_else(|| rest.strip_prefix(':'))?;
        (letter, rest)
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim();
    if text.is_empty() {
        return None;
    }
    Some((label_index(letter)?, text))
}

/// Drop `1.`, `1)`, `Q1.`, `Q1:`, `Question 1:` style numbering.
fn strip_numbering(line: &str) -> (bool, &str) {
    let rest = strip_prefix_ci(line, "question")
        .map(str::trim_start)
        .or_else(|| strip_prefix_ci(line, "q"))
        .unwrap_or(line);
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return (false, line);
    }
    let after = &rest[digits..];
    match after.strip_prefix(['.', ')', ':']) {
        Some(body) => (true, body.trim()),
        None => (false, line),
    }
}
