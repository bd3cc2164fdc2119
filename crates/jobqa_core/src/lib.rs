mod bert;

pub mod agent;
pub mod config;
pub mod corpus;
pub mod distilbert_qa;
pub mod embed;
pub mod error;
pub mod index;
pub mod minilm_embed;
pub mod pipeline;
pub mod qa;

pub use agent::Strategy;
pub use config::{AppConfig, ModelFiles};
pub use corpus::Corpus;
pub use distilbert_qa::DistilBertQa;
pub use embed::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{QaError, Result};
pub use index::{squared_l2, FlatL2Index, RetrievedDoc, Retriever};
pub use minilm_embed::MiniLmEmbeddingProvider;
pub use pipeline::{AskOutcome, AskRequest, Assistant, Mode, TopK, EMPTY_QUESTION_WARNING};
pub use qa::{LexicalAnswerer, QueryResult, QuestionAnswerer};
