use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use neo_common::config::ResponseCacheConfig;
use neo_common::types::{AgentRun, Entity, ToolCallRecord};

use crate::embeddings::Embedder;

/// Stored answers are truncated to keep entries bounded.
const ANSWER_MAX_CHARS: usize = 10_000;
const TOOL_CALLS_MAX: usize = 20;
const INSIGHTS_MAX: usize = 10;
/// How many recent entries a lookup scans.
const CANDIDATE_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(String),

    #[error("cache embedding error: {0}")]
    Embedding(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::Store(e.to_string())
    }
}

/// A reusable cached response.
#[derive(Clone, Debug)]
pub struct CacheHit {
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub insights: Vec<String>,
    pub entities: Vec<Entity>,
    pub similarity: f32,
    pub original_question: String,
}

/// Persistent similarity cache of answered questions.
///
/// One sqlite file, one row per normalized question, embeddings stored as
/// packed little-endian f32 blobs. Cache failures never fail the request:
/// lookups degrade to a miss and writes to a no-op. Without an embedder the
/// cache is inert.
pub struct ResponseCache {
    pool: SqlitePool,
    embedder: Option<Arc<dyn Embedder>>,
    config: ResponseCacheConfig,
}

impl ResponseCache {
    pub async fn connect(
        config: ResponseCacheConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, CacheError> {
        let path = Path::new(&config.db_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::Store(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        // A single connection serializes readers and writers, which is all
        // this store needs.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                embedding BLOB NOT NULL,
                answer TEXT NOT NULL,
                tool_calls TEXT,
                insights TEXT,
                entities TEXT,
                cached_at REAL NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cached_at ON cache(cached_at)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            embedder,
            config,
        })
    }

    /// Look up a semantically similar cached answer. Never fails: any
    /// embedding or store error is logged and treated as a miss.
    pub async fn lookup(&self, question: &str) -> Option<CacheHit> {
        match self.try_lookup(question).await {
            Ok(hit) => {
                if hit.is_some() {
                    metrics::counter!("response_cache.hit").increment(1);
                } else {
                    metrics::counter!("response_cache.miss").increment(1);
                }
                hit
            }
            Err(e) => {
                tracing::warn!(error = %e, "Response cache lookup failed, treating as miss");
                metrics::counter!("response_cache.errors").increment(1);
                None
            }
        }
    }

    async fn try_lookup(&self, question: &str) -> Result<Option<CacheHit>, CacheError> {
        let embedder = match &self.embedder {
            Some(embedder) => embedder,
            None => return Ok(None),
        };

        let query_embedding = embedder
            .embed(question)
            .await
            .map_err(|e| CacheError::Embedding(e.to_string()))?;

        let cutoff = now_epoch() - self.config.ttl_seconds as f64;
        let rows = sqlx::query(
            "SELECT question, embedding, answer, tool_calls, insights, entities \
             FROM cache WHERE cached_at > ? ORDER BY cached_at DESC LIMIT ?",
        )
        .bind(cutoff)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let mut best: Option<(f32, &sqlx::sqlite::SqliteRow)> = None;
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let candidate = unpack_embedding(&blob);
            let similarity = cosine_similarity(&query_embedding, &candidate);
            if best.map_or(true, |(s, _)| similarity > s) {
                best = Some((similarity, row));
            }
        }

        let Some((similarity, row)) = best else {
            return Ok(None);
        };
        if similarity < self.config.similarity_threshold {
            return Ok(None);
        }

        Ok(Some(CacheHit {
            answer: row.get("answer"),
            tool_calls: parse_json_list(row.get("tool_calls")),
            insights: parse_json_list(row.get("insights")),
            entities: parse_json_list(row.get("entities")),
            similarity: (similarity * 1000.0).round() / 1000.0,
            original_question: row.get("question"),
        }))
    }

    /// Upsert a completed run. Never fails the request: errors are logged
    /// and swallowed.
    pub async fn store(&self, question: &str, run: &AgentRun) {
        if let Err(e) = self.try_store(question, run).await {
            tracing::warn!(error = %e, "Response cache write failed, skipping");
            metrics::counter!("response_cache.errors").increment(1);
        }
    }

    async fn try_store(&self, question: &str, run: &AgentRun) -> Result<(), CacheError> {
        let embedder = match &self.embedder {
            Some(embedder) => embedder,
            None => return Ok(()),
        };

        let embedding = embedder
            .embed(question)
            .await
            .map_err(|e| CacheError::Embedding(e.to_string()))?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache")
            .fetch_one(&self.pool)
            .await?;
        if count >= self.config.max_entries as i64 {
            self.evict_oldest_half().await?;
        }

        let answer: String = run.answer.chars().take(ANSWER_MAX_CHARS).collect();
        let tool_calls: Vec<&ToolCallRecord> = run.tool_calls.iter().take(TOOL_CALLS_MAX).collect();
        let insights: Vec<&String> = run.insights.iter().take(INSIGHTS_MAX).collect();

        sqlx::query(
            "INSERT OR REPLACE INTO cache \
             (id, question, embedding, answer, tool_calls, insights, entities, cached_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(question_id(question))
        .bind(question)
        .bind(pack_embedding(&embedding))
        .bind(answer)
        .bind(serde_json::to_string(&tool_calls).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&insights).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&run.entities).unwrap_or_else(|_| "[]".into()))
        .bind(now_epoch())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn evict_oldest_half(&self) -> Result<(), CacheError> {
        let evict = (self.config.max_entries / 2) as i64;
        sqlx::query(
            "DELETE FROM cache WHERE id IN \
             (SELECT id FROM cache ORDER BY cached_at ASC LIMIT ?)",
        )
        .bind(evict)
        .execute(&self.pool)
        .await?;
        metrics::counter!("response_cache.evictions").increment(evict as u64);
        Ok(())
    }

    /// Current entry count (stats and tests).
    pub async fn count(&self) -> Result<i64, CacheError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM cache")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Entry count and limits, for the stats surface. A store failure is
    /// reported inline instead of propagating.
    pub async fn stats(&self) -> serde_json::Value {
        match self.count().await {
            Ok(entries) => serde_json::json!({
                "entries": entries,
                "max_entries": self.config.max_entries,
                "ttl_seconds": self.config.ttl_seconds,
                "similarity_threshold": self.config.similarity_threshold,
            }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        }
    }
}

/// Stable id for a question: digest of the trimmed, lowercased text.
pub fn question_id(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn pack_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn unpack_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn parse_json_list<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Vec<T> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingError;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;

    /// Deterministic embedder: fixed vectors per known text.
    struct MapEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl MapEmbedder {
        fn new(entries: &[(&str, [f32; 4])]) -> Arc<Self> {
            Arc::new(Self {
                vectors: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.to_vec()))
                    .collect(),
            })
        }
    }

    impl Embedder for MapEmbedder {
        fn embed<'a>(
            &'a self,
            text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>> {
            let result = self
                .vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::Api(format!("no vector for {text:?}")));
            Box::pin(async move { result })
        }

        fn dimensions(&self) -> u32 {
            4
        }
    }

    fn config(max_entries: u32, threshold: f32) -> ResponseCacheConfig {
        ResponseCacheConfig {
            db_path: ":memory:".into(),
            ttl_seconds: 3600,
            similarity_threshold: threshold,
            max_entries,
        }
    }

    fn run_with_answer(answer: &str) -> AgentRun {
        AgentRun {
            answer: answer.into(),
            tool_calls: vec![],
            insights: vec!["insight one".into()],
            entities: vec![],
            model: Some("claude-sonnet-4-20250514".into()),
            turns_used: 3,
            warning: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn write_then_read_same_question_is_exact_hit() {
        let embedder = MapEmbedder::new(&[("who leads crispr research?", [1.0, 0.0, 0.0, 0.0])]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        cache
            .store("who leads crispr research?", &run_with_answer("Doudna lab."))
            .await;

        let hit = cache.lookup("who leads crispr research?").await.unwrap();
        assert_eq!(hit.answer, "Doudna lab.");
        assert!((hit.similarity - 1.0).abs() < 1e-3);
        assert_eq!(hit.original_question, "who leads crispr research?");
        assert_eq!(hit.insights, vec!["insight one"]);
    }

    #[tokio::test]
    async fn paraphrase_above_threshold_hits() {
        let embedder = MapEmbedder::new(&[
            ("who are the key epana researchers?", [1.0, 0.0, 0.0, 0.0]),
            // cosine vs the stored vector = 0.9
            ("for epana, who should we contact?", [0.9, 0.43589, 0.0, 0.0]),
        ]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        cache
            .store(
                "who are the key epana researchers?",
                &run_with_answer("Talk to Park and Diaz."),
            )
            .await;

        let hit = cache
            .lookup("for epana, who should we contact?")
            .await
            .unwrap();
        assert_eq!(hit.answer, "Talk to Park and Diaz.");
        assert!(hit.similarity >= 0.80);
        assert_eq!(hit.original_question, "who are the key epana researchers?");
    }

    #[tokio::test]
    async fn dissimilar_question_misses() {
        let embedder = MapEmbedder::new(&[
            ("crispr patents", [1.0, 0.0, 0.0, 0.0]),
            ("sec filings for acme", [0.0, 1.0, 0.0, 0.0]),
        ]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        cache.store("crispr patents", &run_with_answer("42 patents.")).await;
        assert!(cache.lookup("sec filings for acme").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let embedder = MapEmbedder::new(&[("stale question", [1.0, 0.0, 0.0, 0.0])]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        cache.store("stale question", &run_with_answer("old")).await;
        sqlx::query("UPDATE cache SET cached_at = cached_at - 7200")
            .execute(&cache.pool)
            .await
            .unwrap();

        assert!(cache.lookup("stale question").await.is_none());
    }

    #[tokio::test]
    async fn capacity_stays_bounded_by_oldest_half_eviction() {
        let questions: Vec<(String, [f32; 4])> = (0..6)
            .map(|i| {
                let mut v = [0.0f32; 4];
                v[i % 4] = 1.0;
                (format!("question number {i}"), v)
            })
            .collect();
        let entries: Vec<(&str, [f32; 4])> = questions
            .iter()
            .map(|(q, v)| (q.as_str(), *v))
            .collect();
        let embedder = MapEmbedder::new(&entries);
        let cache = ResponseCache::connect(config(4, 0.80), Some(embedder))
            .await
            .unwrap();

        for (question, _) in &questions {
            cache.store(question, &run_with_answer("a")).await;
            assert!(cache.count().await.unwrap() <= 4);
        }
    }

    #[tokio::test]
    async fn long_answers_are_truncated() {
        let embedder = MapEmbedder::new(&[("long answer", [1.0, 0.0, 0.0, 0.0])]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        let long = "x".repeat(12_000);
        cache.store("long answer", &run_with_answer(&long)).await;

        let hit = cache.lookup("long answer").await.unwrap();
        assert_eq!(hit.answer.chars().count(), 10_000);
    }

    #[tokio::test]
    async fn stats_report_entries_and_limits() {
        let embedder = MapEmbedder::new(&[
            ("first question", [1.0, 0.0, 0.0, 0.0]),
            ("second question", [0.0, 1.0, 0.0, 0.0]),
        ]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();

        cache.store("first question", &run_with_answer("a")).await;
        cache.store("second question", &run_with_answer("b")).await;

        let stats = cache.stats().await;
        assert_eq!(stats["entries"], 2);
        assert_eq!(stats["max_entries"], 500);
        assert_eq!(stats["ttl_seconds"], 3600);
        assert!((stats["similarity_threshold"].as_f64().unwrap() - 0.80).abs() < 1e-6);
    }

    #[tokio::test]
    async fn without_embedder_cache_is_inert() {
        let cache = ResponseCache::connect(config(500, 0.80), None).await.unwrap();
        cache.store("anything", &run_with_answer("a")).await;
        assert_eq!(cache.count().await.unwrap(), 0);
        assert!(cache.lookup("anything").await.is_none());
    }

    #[tokio::test]
    async fn embedding_failure_is_a_miss_not_an_error() {
        let embedder = MapEmbedder::new(&[]);
        let cache = ResponseCache::connect(config(500, 0.80), Some(embedder))
            .await
            .unwrap();
        assert!(cache.lookup("unseen question").await.is_none());
    }

    #[test]
    fn embedding_pack_round_trip() {
        let original = vec![0.1f32, -2.5, 3.75, 0.0];
        let packed = pack_embedding(&original);
        assert_eq!(packed.len(), 16);
        assert_eq!(unpack_embedding(&packed), original);
    }

    #[test]
    fn question_id_normalizes() {
        assert_eq!(question_id("  How Many Patents? "), question_id("how many patents?"));
        assert_ne!(question_id("a"), question_id("b"));
    }

    #[test]
    fn cosine_handles_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
