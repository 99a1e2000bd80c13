use std::str::FromStr;

use crate::error::NeoError;
use crate::types::SourceId;

/// Complete engine configuration, assembled from the environment.
///
/// Every knob is an env var (deployment contract); `from_env` fails loudly
/// on unparseable values so the engine refuses to start misconfigured.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub cache: ResponseCacheConfig,
    pub embeddings: EmbeddingConfig,
    pub retry: RetryConfig,
    pub sources: SourceUrls,
    pub tool_results: ToolResultLimits,
}

/// LLM model parameters for the agent tier.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Model identifier (`NEO_AGENT_MODEL`).
    pub model: String,
    /// Max tool-use iterations per run (`NEO_MAX_TURNS`).
    pub max_turns: u32,
    /// Max tokens per response.
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// Semantic response cache parameters.
#[derive(Clone, Debug)]
pub struct ResponseCacheConfig {
    /// Path of the single-file sqlite store (`NEO_CACHE_DB`).
    pub db_path: String,
    /// Entry lifetime in seconds (`NEO_CACHE_TTL`).
    pub ttl_seconds: u64,
    /// Minimum cosine similarity for a hit (`NEO_CACHE_THRESHOLD`).
    pub similarity_threshold: f32,
    /// When the store reaches this count the oldest half is deleted.
    pub max_entries: u32,
}

/// Embedding pipeline configuration.
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    /// Model identifier (`EMBEDDING_MODEL`).
    pub model: String,
    /// Expected vector dimensions; mismatches are rejected.
    pub dimensions: u32,
    /// Base URL of an OpenAI-compatible `/embeddings` endpoint.
    pub base_url: String,
    /// Environment variable holding the API key for that endpoint.
    pub api_key_env: String,
}

/// Retry parameters for LLM and embedding API calls.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Base URLs of the remote SQL sources plus the shared SQL secret.
#[derive(Clone, Debug)]
pub struct SourceUrls {
    pub researchers: String,
    pub patents: String,
    pub grants: String,
    pub policies: String,
    pub portfolio: String,
    pub market_data: String,
    pub sec_sentinel: String,
    /// Forwarded as `secret` on every `/api/sql` call (`NEO_SQL_SECRET`).
    pub sql_secret: String,
}

impl SourceUrls {
    pub fn base_url(&self, source: SourceId) -> &str {
        match source {
            SourceId::Researchers => &self.researchers,
            SourceId::Patents => &self.patents,
            SourceId::Grants => &self.grants,
            SourceId::Policies => &self.policies,
            SourceId::Portfolio => &self.portfolio,
            SourceId::MarketData => &self.market_data,
            SourceId::SecSentinel => &self.sec_sentinel,
        }
    }
}

/// Size limits applied to tool results and traces.
#[derive(Clone, Debug)]
pub struct ToolResultLimits {
    /// Max rows considered for entity extraction per result.
    pub max_entity_rows: usize,
    /// Max chars kept in a recorded tool-call preview.
    pub max_preview_chars: usize,
    /// Max rows rendered in a tier-2 table.
    pub max_table_rows: usize,
}

impl Default for ToolResultLimits {
    fn default() -> Self {
        Self {
            max_entity_rows: 10,
            max_preview_chars: 500,
            max_table_rows: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, NeoError> {
        Ok(Self {
            port: parsed_env("PORT", 8080)?,
            llm: LlmConfig {
                model: string_env("NEO_AGENT_MODEL", "claude-sonnet-4-20250514"),
                max_turns: parsed_env("NEO_MAX_TURNS", 25)?,
                max_tokens: 4096,
                temperature: None,
            },
            cache: ResponseCacheConfig {
                db_path: string_env("NEO_CACHE_DB", "data/neo_cache.db"),
                ttl_seconds: parsed_env("NEO_CACHE_TTL", 3600)?,
                similarity_threshold: parsed_env("NEO_CACHE_THRESHOLD", 0.80f32)?,
                max_entries: 500,
            },
            embeddings: EmbeddingConfig {
                model: string_env("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
                dimensions: parsed_env("EMBEDDING_DIMENSIONS", 384)?,
                base_url: string_env("EMBEDDING_BASE_URL", "https://api.openai.com/v1"),
                api_key_env: string_env("EMBEDDING_API_KEY_ENV", "OPENAI_API_KEY"),
            },
            retry: RetryConfig::default(),
            sources: SourceUrls {
                researchers: string_env(
                    "RESEARCHERS_SERVICE_URL",
                    "https://kdttalentscout.up.railway.app",
                ),
                patents: string_env(
                    "PATENTS_SERVICE_URL",
                    "https://patentwarrior.up.railway.app",
                ),
                grants: string_env(
                    "GRANTS_SERVICE_URL",
                    "https://grants-tracker-production.up.railway.app",
                ),
                policies: string_env("POLICIES_SERVICE_URL", "https://policywatch.up.railway.app"),
                portfolio: string_env(
                    "PORTFOLIO_SERVICE_URL",
                    "https://web-production-a9d068.up.railway.app",
                ),
                market_data: string_env(
                    "MARKET_DATA_SERVICE_URL",
                    "https://clinicaltrialsdata.up.railway.app",
                ),
                sec_sentinel: string_env("SEC_SENTINEL_URL", "https://secsentinel.up.railway.app"),
                sql_secret: string_env("NEO_SQL_SECRET", ""),
            },
            tool_results: ToolResultLimits::default(),
        })
    }
}

fn string_env(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn parsed_env<T>(key: &str, default: T) -> Result<T, NeoError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|_| NeoError::Config(format!("Invalid value for {}: {}", key, value))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_defaults_are_bounded() {
        let retry = RetryConfig::default();
        assert!(retry.max_attempts >= 1);
        assert!(retry.initial_backoff_ms <= retry.max_backoff_ms);
    }

    #[test]
    fn source_urls_cover_every_source() {
        let urls = SourceUrls {
            researchers: "r".into(),
            patents: "p".into(),
            grants: "g".into(),
            policies: "pol".into(),
            portfolio: "port".into(),
            market_data: "m".into(),
            sec_sentinel: "s".into(),
            sql_secret: String::new(),
        };
        for source in SourceId::ALL {
            assert!(!urls.base_url(source).is_empty());
        }
    }
}
