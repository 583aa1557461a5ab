//! Knowledge base - chunked, embedded documents behind a vector store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::embedding::Embedder;
use crate::error::{BrigadeError, Result};
use crate::ingest::{DocumentFetcher, HttpFetcher};

/// Default chunking parameters, in words.
pub const DEFAULT_CHUNK_WORDS: usize = 300;
pub const DEFAULT_OVERLAP_WORDS: usize = 40;

/// One embedded chunk of a source document.
///
/// The natural key is (source, chunk_index); upserts replace records that
/// share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A search hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: KnowledgeRecord,
    pub score: f32,
}

/// Storage backend for knowledge records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any with the same (source, chunk_index).
    async fn upsert(&self, records: Vec<KnowledgeRecord>) -> Result<()>;

    /// Nearest records by cosine similarity, best first.
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredRecord>>;

    /// Number of records stored for a source document.
    async fn count_for_source(&self, source: &str) -> Result<usize>;
}

/// Split text into overlapping word-bounded chunks.
///
/// A zero chunk size yields no chunks; callers validate it upstream.
pub fn chunk_text(text: &str, chunk_words: usize, overlap_words: usize) -> Vec<String> {
    if chunk_words == 0 {
        return Vec::new();
    }
    let overlap = overlap_words.min(chunk_words - 1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let step = chunk_words - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// In-process vector store.
///
/// The test double and small-deployment backend; production deployments use
/// [`PgVectorStore`](crate::pgvector::PgVectorStore).
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<(String, usize), KnowledgeRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: Vec<KnowledgeRecord>) -> Result<()> {
        let mut guard = self.records.write();
        for record in records {
            guard.insert((record.source.clone(), record.chunk_index), record);
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        let guard = self.records.read();
        let mut scored: Vec<ScoredRecord> = guard
            .values()
            .map(|record| ScoredRecord {
                score: cosine_similarity(embedding, &record.embedding),
                record: record.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count_for_source(&self, source: &str) -> Result<usize> {
        Ok(self
            .records
            .read()
            .keys()
            .filter(|(s, _)| s == source)
            .count())
    }
}

/// A source document loaded into a vector store for retrieval-augmented
/// responses.
pub struct KnowledgeBase {
    source_url: String,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    chunk_words: usize,
    overlap_words: usize,
    max_results: usize,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("source_url", &self.source_url)
            .field("chunk_words", &self.chunk_words)
            .field("overlap_words", &self.overlap_words)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    pub fn new(
        source_url: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            embedder,
            store,
            fetcher: Arc::new(HttpFetcher::new()),
            chunk_words: DEFAULT_CHUNK_WORDS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
            max_results: 5,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_chunking(mut self, chunk_words: usize, overlap_words: usize) -> Result<Self> {
        if chunk_words == 0 {
            return Err(BrigadeError::Config(
                "chunk size must be at least one word".into(),
            ));
        }
        self.chunk_words = chunk_words;
        self.overlap_words = overlap_words;
        Ok(self)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Fetch, chunk, embed and upsert the source document.
    ///
    /// With `upsert` set, re-running replaces records keyed by
    /// (source, chunk index); without it, an already-loaded source is left
    /// untouched. Any fetch, embedding or store failure aborts the run -
    /// partial ingestion is never silently accepted.
    #[instrument(skip(self), fields(source = %self.source_url))]
    pub async fn load(&self, upsert: bool) -> Result<usize> {
        if !upsert && self.store.count_for_source(&self.source_url).await? > 0 {
            debug!("Source already ingested, skipping load");
            return Ok(0);
        }

        let text = self.fetcher.fetch(&self.source_url).await?;
        let chunks = chunk_text(&text, self.chunk_words, self.overlap_words);
        if chunks.is_empty() {
            return Err(BrigadeError::Ingestion(format!(
                "document '{}' produced no chunks",
                self.source_url
            )));
        }

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(BrigadeError::Ingestion(format!(
                "embedded {} of {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<KnowledgeRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| KnowledgeRecord {
                source: self.source_url.clone(),
                chunk_index,
                text,
                embedding,
            })
            .collect();
        let count = records.len();

        self.store.upsert(records).await?;

        info!(chunks = count, "Knowledge base loaded");
        Ok(count)
    }

    /// Retrieve the closest chunks for a query.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<ScoredRecord>> {
        let limit = limit.unwrap_or(self.max_results);
        let embedding = self.embedder.embed(query).await?;
        self.store.search(&embedding, limit).await
    }

    /// Render search hits as a numbered reference block for a system prompt.
    pub fn format_references(records: &[ScoredRecord]) -> String {
        let mut out = String::from("Use the following references:\n");
        for (i, hit) in records.iter().enumerate() {
            out.push_str(&format!(
                "{}. [{} #{}] {}\n",
                i + 1,
                hit.record.source,
                hit.record.chunk_index,
                hit.record.text
            ));
        }
        out
    }
}
