use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("corpus must contain at least one document")]
    EmptyCorpus,

    #[error("top-k must be 1, 2 or 3 (got {0})")]
    InvalidTopK(usize),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("context is empty")]
    EmptyContext,

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QaError>;
