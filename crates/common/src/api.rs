use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AgentRun, Entity, RunError, RunWarning, ToolCallRecord};

/// A prior conversation turn supplied by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// POST /api/neo-analyze request.
#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Conversation history for follow-ups; non-empty history bypasses
    /// both the router and the response cache.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub skip_cache: bool,
    #[serde(default)]
    pub skip_router: bool,
}

/// POST /api/neo-analyze response.
#[derive(Clone, Debug, Serialize)]
pub struct AnalyzeResponse {
    pub question: String,
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub insights: Vec<String>,
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub turns_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    pub routed: bool,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<RunWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl AnalyzeResponse {
    /// Envelope for a completed agent run (tier 3).
    pub fn from_run(question: String, run: AgentRun) -> Self {
        Self {
            question,
            answer: run.answer,
            tool_calls: run.tool_calls,
            insights: run.insights,
            entities: run.entities,
            model: run.model,
            turns_used: run.turns_used,
            tier: Some(3),
            tier_name: Some("agent"),
            generated_sql: None,
            routed: false,
            cached: false,
            similarity: None,
            original_question: None,
            warning: run.warning,
            error: run.error,
        }
    }
}

/// POST /api/rag-ask request — context-anchored Q&A without tools.
#[derive(Clone, Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default = "default_n_context")]
    pub n_context: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Skip the context search for follow-up questions.
    #[serde(default)]
    pub skip_search: bool,
}

fn default_n_context() -> usize {
    5
}

/// POST /api/rag-ask response.
#[derive(Clone, Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Value>,
    pub context_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

/// GET /api/rag-search query parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub sources: Option<String>,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

fn default_n_results() -> usize {
    10
}

/// One hit from the legacy cross-source search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub source: String,
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// GET /api/rag-search response.
#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub count: usize,
    pub sources_searched: Vec<String>,
}

/// GET /api/neo-query query parameters (debug passthrough).
#[derive(Clone, Debug, Deserialize)]
pub struct DebugQueryParams {
    pub database: String,
    pub query: String,
}
