pub mod cache;

use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use neo_common::config::SourceUrls;
use neo_common::types::{QueryResult, SourceId};
use neo_common::NeoError;

use cache::{cache_key, QueryCache};

/// Query cache lifetime and bound.
const QUERY_CACHE_TTL: Duration = Duration::from_secs(300);
const QUERY_CACHE_CAPACITY: usize = 100;

/// Per-attempt budgets for `/api/sql` — the retry gets a longer one.
const FIRST_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(90);
const RETRY_TIMEOUT: Duration = Duration::from_secs(120);
const INTROSPECT_TIMEOUT: Duration = Duration::from_secs(10);
const SEMANTIC_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard ceiling on rows per query, enforced on the wire.
pub const MAX_ROW_LIMIT: usize = 500;

static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blimit\b").expect("valid regex"));

/// Errors from the remote SQL access layer.
#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("Query timed out after 2 attempts. Try a simpler query with more restrictive WHERE clauses.")]
    Timeout,

    #[error("Query error: {0}")]
    Rejected(String),

    #[error("Source request failed: {0}")]
    Upstream(String),
}

impl From<SqlError> for NeoError {
    fn from(e: SqlError) -> Self {
        match e {
            SqlError::Timeout => NeoError::Timeout(e.to_string()),
            other => NeoError::SourceQuery(other.to_string()),
        }
    }
}

/// A table name returned by source introspection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
}

/// A column description returned by source introspection.
/// `notnull`/`pk` arrive as bools from some sources and ints from others.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub notnull: Value,
    #[serde(default)]
    pub pk: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Serialize)]
struct SqlRequestBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<&'a str>,
}

#[derive(Deserialize)]
struct TablesBody {
    #[serde(default)]
    tables: Vec<String>,
}

#[derive(Deserialize)]
struct SchemaBody {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

/// Validate and bound a SELECT statement before it goes on the wire.
///
/// Rejects anything that is not a SELECT; appends `LIMIT min(limit, 500)`
/// when the statement carries no LIMIT clause of its own.
pub fn prepare_sql(sql: &str, limit: usize) -> Result<String, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();

    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(SqlError::Rejected(
            "Only SELECT queries are allowed".to_string(),
        ));
    }

    if LIMIT_CLAUSE.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Ok(format!("{} LIMIT {}", trimmed, limit.min(MAX_ROW_LIMIT)))
}

/// HTTP client for the remote SQL sources.
///
/// Every source exposes the same contract under its base URL:
/// `POST /api/sql`, `GET /api/sql/tables`, `GET /api/sql/schema/<table>`.
/// The SEC source additionally exposes `/api/semantic/*` endpoints.
pub struct SqlClient {
    http: reqwest::Client,
    urls: SourceUrls,
    cache: Mutex<QueryCache>,
}

impl SqlClient {
    pub fn new(http: reqwest::Client, urls: SourceUrls) -> Self {
        Self {
            http,
            urls,
            cache: Mutex::new(QueryCache::new(QUERY_CACHE_TTL, QUERY_CACHE_CAPACITY)),
        }
    }

    pub fn base_url(&self, source: SourceId) -> &str {
        self.urls.base_url(source)
    }

    /// Execute a SELECT against a source with caching and timeout retry.
    ///
    /// Retries once on timeout with a longer budget; never retries 4xx.
    /// A 4xx body's `detail` field surfaces as `SqlError::Rejected`.
    pub async fn execute(
        &self,
        source: SourceId,
        sql: &str,
        limit: usize,
        use_cache: bool,
    ) -> Result<QueryResult, SqlError> {
        let query = prepare_sql(sql, limit)?;
        let key = cache_key(source, &query);

        if use_cache {
            let cached = {
                let cache = self.cache.lock().expect("query cache poisoned");
                cache.get(&key)
            };
            if let Some(result) = cached {
                tracing::debug!(source = %source, "Query served from cache");
                return Ok(result);
            }
        }

        let url = format!("{}/api/sql", self.urls.base_url(source));
        let secret = (!self.urls.sql_secret.is_empty()).then_some(self.urls.sql_secret.as_str());
        let body = SqlRequestBody {
            query: &query,
            secret,
        };

        let mut timed_out = false;
        for attempt in 0..2u32 {
            let timeout = if attempt == 0 {
                FIRST_ATTEMPT_TIMEOUT
            } else {
                RETRY_TIMEOUT
            };

            let start = std::time::Instant::now();
            let response = self
                .http
                .post(&url)
                .timeout(timeout)
                .json(&body)
                .send()
                .await;

            metrics::histogram!("sql.query.latency", "source" => source.as_str())
                .record(start.elapsed().as_secs_f64());

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    tracing::warn!(source = %source, attempt, "Source query timed out");
                    timed_out = true;
                    continue;
                }
                Err(e) => {
                    metrics::counter!("sql.query.errors", "source" => source.as_str()).increment(1);
                    return Err(SqlError::Upstream(e.to_string()));
                }
            };

            let status = response.status();
            if status.is_client_error() {
                let detail = response
                    .json::<ErrorBody>()
                    .await
                    .map(|b| b.detail)
                    .unwrap_or_default();
                metrics::counter!("sql.query.rejected", "source" => source.as_str()).increment(1);
                let detail = if detail.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    detail
                };
                return Err(SqlError::Rejected(detail));
            }

            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                metrics::counter!("sql.query.errors", "source" => source.as_str()).increment(1);
                return Err(SqlError::Upstream(format!("{}: {}", status, body_text)));
            }

            let mut result: QueryResult = response
                .json()
                .await
                .map_err(|e| SqlError::Upstream(format!("Malformed source response: {}", e)))?;
            result.row_count = result.rows.len();

            if use_cache {
                let mut cache = self.cache.lock().expect("query cache poisoned");
                cache.insert(key, result.clone());
            }

            return Ok(result);
        }

        debug_assert!(timed_out);
        metrics::counter!("sql.query.timeouts", "source" => source.as_str()).increment(1);
        Err(SqlError::Timeout)
    }

    /// List all tables in a source.
    pub async fn list_tables(&self, source: SourceId) -> Result<Vec<TableInfo>, SqlError> {
        let url = format!("{}/api/sql/tables", self.urls.base_url(source));
        let response = self
            .http
            .get(&url)
            .timeout(INTROSPECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| SqlError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SqlError::Upstream(format!("HTTP {}", response.status())));
        }

        let body: TablesBody = response
            .json()
            .await
            .map_err(|e| SqlError::Upstream(format!("Malformed tables response: {}", e)))?;

        Ok(body.tables.into_iter().map(|name| TableInfo { name }).collect())
    }

    /// Get the column schema for one table.
    pub async fn describe(
        &self,
        source: SourceId,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, SqlError> {
        let url = format!("{}/api/sql/schema/{}", self.urls.base_url(source), table);
        let response = self
            .http
            .get(&url)
            .timeout(INTROSPECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| SqlError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SqlError::Upstream(format!("HTTP {}", response.status())));
        }

        let body: SchemaBody = response
            .json()
            .await
            .map_err(|e| SqlError::Upstream(format!("Malformed schema response: {}", e)))?;

        Ok(body.columns)
    }

    /// Call one of the SEC source's domain endpoints. The payload shapes are
    /// owned by that service and passed through untouched.
    pub async fn semantic_endpoint(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SqlError> {
        let url = format!(
            "{}/api/semantic/{}",
            self.urls.base_url(SourceId::SecSentinel),
            path
        );

        let response = self
            .http
            .get(&url)
            .timeout(SEMANTIC_TIMEOUT)
            .query(params)
            .send()
            .await
            .map_err(|e| SqlError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.detail)
                .unwrap_or_default();
            return Err(SqlError::Rejected(if detail.is_empty() {
                format!("HTTP {}", status)
            } else {
                detail
            }));
        }
        if !status.is_success() {
            return Err(SqlError::Upstream(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| SqlError::Upstream(format!("Malformed semantic response: {}", e)))
    }

    /// Availability, base URL, and per-table row counts for every source.
    pub async fn database_stats(&self) -> Value {
        let checks = SourceId::ALL.map(|source| self.source_stats(source));
        let results = futures::future::join_all(checks).await;

        let mut databases = serde_json::Map::new();
        for (source, stats) in SourceId::ALL.iter().zip(results) {
            databases.insert(source.as_str().to_string(), stats);
        }
        Value::Object(databases)
    }

    async fn source_stats(&self, source: SourceId) -> Value {
        let tables = match self.list_tables(source).await {
            Ok(tables) => tables,
            Err(e) => {
                return serde_json::json!({ "available": false, "error": e.to_string() });
            }
        };

        let mut counts = serde_json::Map::new();
        for table in &tables {
            let sql = format!("SELECT COUNT(*) as cnt FROM {}", table.name);
            let count = match self.execute(source, &sql, MAX_ROW_LIMIT, true).await {
                Ok(result) => result
                    .rows
                    .first()
                    .and_then(|row| row.get("cnt"))
                    .cloned()
                    .unwrap_or(Value::from(0)),
                Err(_) => Value::String("error".to_string()),
            };
            counts.insert(table.name.clone(), count);
        }

        serde_json::json!({
            "available": true,
            "url": self.urls.base_url(source),
            "tables": counts,
        })
    }

    /// Entry count and limits of the process-wide query cache, for the
    /// stats surface.
    pub fn cache_stats(&self) -> Value {
        let entries = self.cache.lock().expect("query cache poisoned").len();
        serde_json::json!({
            "entries": entries,
            "max_entries": QUERY_CACHE_CAPACITY,
            "ttl_seconds": QUERY_CACHE_TTL.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SqlClient {
        let urls = SourceUrls {
            researchers: "https://r.test".into(),
            patents: "https://p.test".into(),
            grants: "https://g.test".into(),
            policies: "https://pol.test".into(),
            portfolio: "https://port.test".into(),
            market_data: "https://m.test".into(),
            sec_sentinel: "https://s.test".into(),
            sql_secret: String::new(),
        };
        SqlClient::new(reqwest::Client::new(), urls)
    }

    #[test]
    fn cache_stats_reports_entries_and_bounds() {
        let client = test_client();
        let stats = client.cache_stats();
        assert_eq!(stats["entries"], 0);
        assert_eq!(stats["max_entries"], 100);
        assert_eq!(stats["ttl_seconds"], 300);
    }

    #[test]
    fn rejects_non_select() {
        assert!(prepare_sql("DELETE FROM patents", 100).is_err());
        assert!(prepare_sql("  update grants set total_cost = 0", 100).is_err());
        assert!(prepare_sql("", 100).is_err());
    }

    #[test]
    fn accepts_lowercase_select() {
        let sql = prepare_sql("select * from patents", 100).unwrap();
        assert_eq!(sql, "select * from patents LIMIT 100");
    }

    #[test]
    fn appends_bounded_limit() {
        let sql = prepare_sql("SELECT COUNT(*) as count FROM patents", 1000).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) as count FROM patents LIMIT 500");
    }

    #[test]
    fn preserves_existing_limit() {
        let sql = prepare_sql("SELECT * FROM patents LIMIT 10", 100).unwrap();
        assert_eq!(sql, "SELECT * FROM patents LIMIT 10");

        let lower = prepare_sql("SELECT * FROM patents limit 10", 100).unwrap();
        assert_eq!(lower, "SELECT * FROM patents limit 10");
    }

    #[test]
    fn limit_detection_is_whole_word() {
        // "delimited" contains "limit" as a substring but not as a word.
        let sql = prepare_sql("SELECT delimited FROM notes", 50).unwrap();
        assert_eq!(sql, "SELECT delimited FROM notes LIMIT 50");
    }

    #[test]
    fn strips_trailing_semicolon_before_appending() {
        let sql = prepare_sql("SELECT * FROM patents;", 100).unwrap();
        assert_eq!(sql, "SELECT * FROM patents LIMIT 100");
    }
}
