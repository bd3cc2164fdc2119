use serde::{Deserialize, Serialize};

use crate::agent::Strategy;
use crate::corpus::Corpus;
use crate::embed::EmbeddingProvider;
use crate::error::{QaError, Result};
use crate::index::{RetrievedDoc, Retriever};
use crate::qa::{QueryResult, QuestionAnswerer};

pub const EMPTY_QUESTION_WARNING: &str = "Please enter a question first.";

/// Number of documents handed to the reader. Only 1, 2 and 3 are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct TopK(usize);

impl TopK {
    pub const CHOICES: [usize; 3] = [1, 2, 3];

    pub fn new(k: usize) -> Result<Self> {
        if Self::CHOICES.contains(&k) {
            Ok(Self(k))
        } else {
            Err(QaError::InvalidTopK(k))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<usize> for TopK {
    type Error = QaError;

    fn try_from(k: usize) -> Result<Self> {
        Self::new(k)
    }
}

impl From<TopK> for usize {
    fn from(k: TopK) -> usize {
        k.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Retrieve the closest paragraphs, then read them.
    #[default]
    Retrieval,
    /// Read one fixed paragraph.
    Fixed,
}

#[derive(Debug, Clone)]
pub struct AskRequest {
    pub question: String,
    pub top_k: TopK,
    pub show_reasoning: bool,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: TopK::default(),
            show_reasoning: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Warning {
        message: String,
    },
    Answered {
        result: QueryResult,
        reasoning: Option<Strategy>,
        hits: Vec<RetrievedDoc>,
    },
    Failed {
        reasoning: Option<Strategy>,
        message: String,
    },
}

enum Source<E> {
    Retrieval(Retriever<E>),
    Fixed(Corpus),
}

/// Owns the loaded models and turns one question into one outcome.
pub struct Assistant<E, Q> {
    source: Source<E>,
    reader: Q,
}

impl<E: EmbeddingProvider, Q: QuestionAnswerer> Assistant<E, Q> {
    /// Builds the flat index over `corpus` up front.
    pub fn with_retrieval(embedder: E, corpus: Corpus, reader: Q) -> Result<Self> {
        Ok(Self {
            source: Source::Retrieval(Retriever::build(embedder, corpus)?),
            reader,
        })
    }

    pub fn with_fixed_context(corpus: Corpus, reader: Q) -> Self {
        Self {
            source: Source::Fixed(corpus),
            reader,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.source {
            Source::Retrieval(_) => Mode::Retrieval,
            Source::Fixed(_) => Mode::Fixed,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        match &self.source {
            Source::Retrieval(r) => r.corpus(),
            Source::Fixed(c) => c,
        }
    }

    /// Retrieval errors propagate; reader errors become `AskOutcome::Failed`.
    pub fn ask(&self, request: &AskRequest) -> Result<AskOutcome> {
        let question = request.question.trim();
        if question.is_empty() {
            return Ok(AskOutcome::Warning {
                message: EMPTY_QUESTION_WARNING.to_string(),
            });
        }

        let (context, hits, reasoning) = match &self.source {
            Source::Retrieval(retriever) => {
                let hits = retriever.retrieve(question, request.top_k.get())?;
                let context = hits
                    .iter()
                    .map(|h| h.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let strategy = Strategy::plan(question);
                tracing::debug!(?strategy, hits = hits.len(), "planned answer");
                let reasoning = request.show_reasoning.then_some(strategy);
                (context, hits, reasoning)
            }
            Source::Fixed(corpus) => (corpus.context(), Vec::new(), None),
        };

        match self.reader.answer(question, &context) {
            Ok(result) => Ok(AskOutcome::Answered {
                result,
                reasoning,
                hits,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "reader failed");
                Ok(AskOutcome::Failed {
                    reasoning,
                    message: format!("Error: {err}"),
                })
            }
        }
    }
}
