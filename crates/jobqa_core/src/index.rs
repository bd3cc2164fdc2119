use serde::Serialize;

use crate::corpus::Corpus;
use crate::embed::EmbeddingProvider;
use crate::error::{QaError, Result};

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Exact nearest-neighbour index over a flat array of vectors.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Embeds every document of `corpus`, in order.
    pub fn build<E: EmbeddingProvider + ?Sized>(embedder: &E, corpus: &Corpus) -> Result<Self> {
        let mut index: Option<Self> = None;
        for doc in corpus.iter() {
            let vector = embedder.embed(doc)?;
            index
                .get_or_insert_with(|| Self::new(vector.len()))
                .add(vector)?;
        }
        // Corpus is never empty, so the first document always seeds the index.
        index.ok_or(QaError::EmptyCorpus)
    }

    pub fn add(&mut self, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(QaError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Returns up to `k` `(position, squared distance)` pairs, closest first.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(QaError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDoc {
    pub index: usize,
    pub text: String,
    pub distance: f32,
}

/// Embedder, index and the corpus it was built from.
pub struct Retriever<E> {
    embedder: E,
    index: FlatL2Index,
    corpus: Corpus,
}

impl<E: EmbeddingProvider> Retriever<E> {
    pub fn build(embedder: E, corpus: Corpus) -> Result<Self> {
        let index = FlatL2Index::build(&embedder, &corpus)?;
        tracing::debug!(docs = index.len(), dim = index.dim(), "built flat L2 index");
        Ok(Self {
            embedder,
            index,
            corpus,
        })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
        let query_vec = self.embedder.embed(query)?;
        let hits = self.index.search(&query_vec, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(index, distance)| {
                tracing::debug!(index, distance, "retrieved document");
                self.corpus.get(index).map(|text| RetrievedDoc {
                    index,
                    text: text.to_string(),
                    distance,
                })
            })
            .collect())
    }
}
