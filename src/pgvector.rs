//! Postgres/pgvector backend for the knowledge store

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument};

use crate::error::{BrigadeError, Result};
use crate::knowledge::{KnowledgeRecord, ScoredRecord, VectorStore};

/// Connection URL for the local docker bootstrap
/// ([`PgVectorBootstrap`](crate::bootstrap::PgVectorBootstrap)).
pub const DEFAULT_DB_URL: &str = "postgresql://ai:ai@localhost:5532/ai";

fn store_err(context: &str, e: sqlx::Error) -> BrigadeError {
    BrigadeError::Store(format!("{context}: {e}"))
}

/// Render an embedding as a pgvector literal, e.g. `[0.1,0.2]`.
fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

fn parse_vector_literal(text: &str) -> Result<Vec<f32>> {
    text.trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<f32>()
                .map_err(|e| BrigadeError::Store(format!("malformed vector literal: {e}")))
        })
        .collect()
}

/// Knowledge store backed by Postgres with the pgvector extension.
///
/// Records are keyed by (source, chunk_index); search uses cosine distance
/// over the stored embeddings.
pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dimension: usize,
}

impl PgVectorStore {
    /// Connect and ensure the extension and table exist.
    #[instrument(skip(db_url))]
    pub async fn connect(db_url: &str, table: &str, dimension: usize) -> Result<Self> {
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BrigadeError::Config(format!(
                "invalid table name '{table}'"
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(|e| store_err("failed to connect to database", e))?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&pool)
            .await
            .map_err(|e| store_err("failed to enable pgvector extension", e))?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                source TEXT NOT NULL,
                chunk_index BIGINT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({dimension}) NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (source, chunk_index)
            )"
        );
        sqlx::query(&create)
            .execute(&pool)
            .await
            .map_err(|e| store_err("failed to create knowledge table", e))?;

        info!(table, dimension, "Connected to pgvector store");
        Ok(Self {
            pool,
            table: table.to_string(),
            dimension,
        })
    }

    /// Connect to the local bootstrap database with the default table.
    pub async fn connect_local(dimension: usize) -> Result<Self> {
        Self::connect(DEFAULT_DB_URL, "knowledge", dimension).await
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn upsert(&self, records: Vec<KnowledgeRecord>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (source, chunk_index, content, embedding)
             VALUES ($1, $2, $3, $4::vector)
             ON CONFLICT (source, chunk_index)
             DO UPDATE SET content = EXCLUDED.content,
                           embedding = EXCLUDED.embedding,
                           updated_at = now()",
            self.table
        );

        let count = records.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("failed to begin transaction", e))?;

        for record in records {
            if record.embedding.len() != self.dimension {
                return Err(BrigadeError::Store(format!(
                    "embedding dimension mismatch: table holds {}, record has {}",
                    self.dimension,
                    record.embedding.len()
                )));
            }
            sqlx::query(&sql)
                .bind(&record.source)
                .bind(record.chunk_index as i64)
                .bind(&record.text)
                .bind(vector_literal(&record.embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| store_err("failed to upsert record", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| store_err("failed to commit upsert", e))?;

        debug!(records = count, "Upserted knowledge records");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        if embedding.len() != self.dimension {
            return Err(BrigadeError::Store(format!(
                "query dimension mismatch: table holds {}, query has {}",
                self.dimension,
                embedding.len()
            )));
        }

        let sql = format!(
            "SELECT source, chunk_index, content, embedding::text AS embedding,
                    1 - (embedding <=> $1::vector) AS score
             FROM {}
             ORDER BY embedding <=> $1::vector
             LIMIT $2",
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(vector_literal(embedding))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("search query failed", e))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let source: String = row
                .try_get("source")
                .map_err(|e| store_err("missing source column", e))?;
            let chunk_index: i64 = row
                .try_get("chunk_index")
                .map_err(|e| store_err("missing chunk_index column", e))?;
            let text: String = row
                .try_get("content")
                .map_err(|e| store_err("missing content column", e))?;
            let embedding_text: String = row
                .try_get("embedding")
                .map_err(|e| store_err("missing embedding column", e))?;
            let score: f64 = row
                .try_get("score")
                .map_err(|e| store_err("missing score column", e))?;

            hits.push(ScoredRecord {
                record: KnowledgeRecord {
                    source,
                    chunk_index: chunk_index as usize,
                    text,
                    embedding: parse_vector_literal(&embedding_text)?,
                },
                score: score as f32,
            });
        }
        Ok(hits)
    }

    async fn count_for_source(&self, source: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) AS n FROM {} WHERE source = $1", self.table);
        let row = sqlx::query(&sql)
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("count query failed", e))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| store_err("missing count column", e))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_formats_pg_style() {
        assert_eq!(vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn vector_literal_roundtrips() {
        let v = vec![0.125, -3.5, 42.0];
        assert_eq!(parse_vector_literal(&vector_literal(&v)).unwrap(), v);
    }

    #[test]
    fn malformed_literal_is_a_store_error() {
        let err = parse_vector_literal("[1,not-a-number]").unwrap_err();
        assert!(matches!(err, BrigadeError::Store(_)));
    }
}
