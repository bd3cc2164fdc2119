use serde::Serialize;

use crate::error::{QaError, Result};

/// Best answer span for one question. `start..end` is a byte range into the
/// context the answer was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

pub trait QuestionAnswerer {
    fn answer(&self, question: &str, context: &str) -> Result<QueryResult>;
}

impl QuestionAnswerer for Box<dyn QuestionAnswerer> {
    fn answer(&self, question: &str, context: &str) -> Result<QueryResult> {
        (**self).answer(question, context)
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "are", "for", "what", "which", "where", "who", "how", "does", "is", "in",
    "of", "to", "a", "an", "on", "with", "there", "their", "jobs", "job", "germany", "german",
    "most", "any", "can", "you", "tell", "about",
];

/// Model-free reader: returns the context clause sharing the most content
/// words with the question.
#[derive(Debug, Clone, Default)]
pub struct LexicalAnswerer;

impl LexicalAnswerer {
    pub fn new() -> Self {
        Self
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn same_word(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= 4 && long.starts_with(short)
}

/// Splits `context` on clause punctuation, yielding trimmed byte ranges.
fn clauses(context: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut begin = 0;
    for (i, c) in context.char_indices() {
        if matches!(c, '.' | ';' | ':' | '!' | '?' | '\n') {
            push_trimmed(context, begin, i, &mut out);
            begin = i + c.len_utf8();
        }
    }
    push_trimmed(context, begin, context.len(), &mut out);
    out
}

fn push_trimmed(context: &str, begin: usize, end: usize, out: &mut Vec<(usize, usize)>) {
    let slice = &context[begin..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        out.push((begin + lead, begin + lead + trimmed.len()));
    }
}

impl QuestionAnswerer for LexicalAnswerer {
    fn answer(&self, question: &str, context: &str) -> Result<QueryResult> {
        let spans = clauses(context);
        let Some(&(first_start, first_end)) = spans.first() else {
            return Err(QaError::EmptyContext);
        };

        let mut keywords: Vec<String> = words(question)
            .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
            .collect();
        keywords.dedup();

        let mut best = (first_start, first_end, 0usize);
        if !keywords.is_empty() {
            for &(start, end) in &spans {
                let clause_words: Vec<String> = words(&context[start..end]).collect();
                let hits = keywords
                    .iter()
                    .filter(|k| clause_words.iter().any(|w| same_word(k, w)))
                    .count();
                if hits > best.2 {
                    best = (start, end, hits);
                }
            }
        }

        let (start, end, hits) = best;
        let score = if keywords.is_empty() {
            0.0
        } else {
            hits as f32 / keywords.len() as f32
        };
        tracing::debug!(start, end, score, "lexical span selected");

        Ok(QueryResult {
            answer: context[start..end].to_string(),
            score,
            start,
            end,
        })
    }
}
