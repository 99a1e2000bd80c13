mod anthropic;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use neo_common::config::RetryConfig;
use neo_common::NeoError;

pub use types::{ContentBlock, LlmResponse, Message, Role, StopReason, TokenUsage, ToolDefinition};

/// Per-call model parameters. The model id varies per request (callers may
/// override it), so it travels with the call rather than the client.
#[derive(Clone, Copy, Debug)]
pub struct ChatParams<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub system: &'a str,
}

/// Errors from LLM API calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM HTTP error: {0}")]
    Http(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM auth error: {0}")]
    Auth(String),

    #[error("LLM rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("LLM context window exceeded: {0}")]
    ContextWindowExceeded(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),
}

impl LlmError {
    fn is_non_retryable(&self) -> bool {
        matches!(self, LlmError::Auth(_) | LlmError::ContextWindowExceeded(_))
    }
}

impl From<LlmError> for NeoError {
    fn from(e: LlmError) -> Self {
        NeoError::LlmApi(e.to_string())
    }
}

/// Anthropic Messages client with retry/backoff.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    retry: RetryConfig,
}

impl LlmClient {
    /// Reads `ANTHROPIC_API_KEY`; returns None when unset so the caller can
    /// degrade to a canned "not configured" answer instead of failing.
    pub fn new(http: reqwest::Client, retry: RetryConfig) -> Option<Self> {
        let api_key = match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!("ANTHROPIC_API_KEY not set — agent tier disabled");
                return None;
            }
        };

        Some(Self {
            http,
            api_key,
            retry,
        })
    }

    /// Send a chat request, retrying transient failures with backoff.
    pub async fn chat(
        &self,
        params: ChatParams<'_>,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0u32;
        let mut backoff_ms = self.retry.initial_backoff_ms;

        loop {
            attempt += 1;
            let result =
                anthropic::send_messages(&self.http, &self.api_key, &params, messages, tools).await;

            match result {
                Ok(response) => return Ok(response),
                Err(ref e) if e.is_non_retryable() => {
                    metrics::counter!("llm.api.errors").increment(1);
                    return result;
                }
                Err(LlmError::RateLimited { retry_after }) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("llm.api.errors").increment(1);
                        return Err(LlmError::RateLimited { retry_after });
                    }
                    let wait = retry_after.map(|s| s * 1000).unwrap_or(backoff_ms);
                    tracing::warn!(attempt, wait_ms = wait, "LLM rate limited, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("llm.api.errors").increment(1);
                        return Err(e);
                    }
                    let jitter = if self.retry.jitter {
                        compute_jitter(attempt, backoff_ms)
                    } else {
                        0
                    };
                    let wait = backoff_ms + jitter;
                    tracing::warn!(attempt, wait_ms = wait, error = %e, "LLM API error, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
                    backoff_ms = (backoff_ms as f64 * self.retry.backoff_multiplier) as u64;
                    backoff_ms = backoff_ms.min(self.retry.max_backoff_ms);
                }
            }
        }
    }
}

/// Hash-derived jitter; avoids pulling in a RNG for backoff smear.
fn compute_jitter(attempt: u32, backoff_ms: u64) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::hash::DefaultHasher::new();
    attempt.hash(&mut hasher);
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        .hash(&mut hasher);
    hasher.finish() % (backoff_ms / 2 + 1)
}

/// Object-safe caller trait: production uses [`LlmClient`], agent-loop tests
/// substitute a scripted mock.
pub trait LlmCaller: Send + Sync {
    fn chat<'a>(
        &'a self,
        params: ChatParams<'a>,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>>;
}

impl LlmCaller for LlmClient {
    fn chat<'a>(
        &'a self,
        params: ChatParams<'a>,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.chat(params, messages, tools))
    }
}
