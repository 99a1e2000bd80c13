use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use neo_common::api::{AnalyzeRequest, AnalyzeResponse, AskRequest, AskResponse};
use neo_common::config::EngineConfig;
use neo_common::types::{QueryResult, RunError, SourceId, TierResult};
use neo_common::NeoError;

use crate::agent::events::AgentEvent;
use crate::agent::{run_agent, AgentOptions};
use crate::cache::ResponseCache;
use crate::embeddings::{Embedder, EmbeddingClient};
use crate::llm::{ChatParams, LlmClient, Message};
use crate::router::Router;
use crate::search;
use crate::sources::{SqlClient, MAX_ROW_LIMIT};
use crate::tools::{handlers, ToolContext, ToolRegistry};

const NOT_CONFIGURED_ANSWER: &str =
    "The SQL agent is not configured. Please set ANTHROPIC_API_KEY.";

const ASK_SYSTEM_PROMPT: &str = "\
You are a biotech/deeptech analyst.
Answer using ONLY the CONTEXT below - no outside knowledge.
If the information is not in the context, say \"I don't have that in the knowledge base.\"
Cite sources by their document number [1], [2], etc.
Be concise but thorough, with clear structure when listing multiple items.";

const ASK_DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Public facade: composes router → response cache → agent, in that order.
pub struct QuestionService {
    config: EngineConfig,
    sql: Arc<SqlClient>,
    router: Router,
    cache: Option<Arc<ResponseCache>>,
    llm: Option<Arc<LlmClient>>,
}

impl QuestionService {
    pub async fn new(config: EngineConfig) -> Self {
        let http = reqwest::Client::new();
        let sql = Arc::new(SqlClient::new(http.clone(), config.sources.clone()));
        let router = Router::new(
            Arc::clone(&sql),
            config.sources.clone(),
            config.tool_results.clone(),
        );

        let embedder = EmbeddingClient::new(http.clone(), config.embeddings.clone(), config.retry.clone())
            .map(|client| Arc::new(client) as Arc<dyn Embedder>);
        let cache = match ResponseCache::connect(config.cache.clone(), embedder).await {
            Ok(cache) => {
                let entries = cache.count().await.unwrap_or(0);
                tracing::info!(
                    entries,
                    max_entries = config.cache.max_entries,
                    ttl_seconds = config.cache.ttl_seconds,
                    "Response cache ready"
                );
                Some(Arc::new(cache))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Response cache unavailable — continuing without it");
                None
            }
        };

        let llm = LlmClient::new(http, config.retry.clone()).map(Arc::new);

        Self {
            config,
            sql,
            router,
            cache,
            llm,
        }
    }

    pub fn sql(&self) -> &Arc<SqlClient> {
        &self.sql
    }

    /// Answer a question. Tier 1/2 answers bypass the LLM entirely; tier 3
    /// consults the semantic cache, then runs the agent loop.
    pub async fn ask(&self, request: AnalyzeRequest) -> AnalyzeResponse {
        self.ask_inner(request, None).await
    }

    /// Streaming variant: progress events arrive on the returned channel,
    /// ending with a single `complete` event carrying the full response.
    pub fn ask_streaming(self: &Arc<Self>, request: AnalyzeRequest) -> UnboundedReceiver<AgentEvent> {
        let (tx, rx) = unbounded_channel();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let response = service.ask_inner(request, Some(&tx)).await;
            let _ = tx.send(AgentEvent::Complete {
                data: Box::new(response),
            });
        });
        rx
    }

    async fn ask_inner(
        &self,
        request: AnalyzeRequest,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> AnalyzeResponse {
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, question = %request.question, "Question received");

        let question = request.question.clone();
        let has_history = !request.messages.is_empty();

        // Step 1: tier router. Follow-up turns always go live to the agent.
        if !request.skip_router && !has_history {
            emit_status(events, "Checking if I can answer instantly...");
            match self.router.route(&question).await {
                TierResult::Instant { answer, data: _ } => {
                    tracing::info!(tier = 1, "Answered by router");
                    return AnalyzeResponse {
                        question,
                        answer,
                        tool_calls: vec![],
                        insights: vec![],
                        entities: vec![],
                        model: None,
                        turns_used: 0,
                        tier: Some(1),
                        tier_name: Some("instant"),
                        generated_sql: None,
                        routed: true,
                        cached: false,
                        similarity: None,
                        original_question: None,
                        warning: None,
                        error: None,
                    };
                }
                TierResult::Fast {
                    answer,
                    rows: _,
                    sql,
                    entities,
                } => {
                    tracing::info!(tier = 2, "Answered by router template");
                    return AnalyzeResponse {
                        question,
                        answer,
                        tool_calls: vec![],
                        insights: vec![],
                        entities,
                        model: None,
                        turns_used: 0,
                        tier: Some(2),
                        tier_name: Some("fast"),
                        generated_sql: Some(sql),
                        routed: true,
                        cached: false,
                        similarity: None,
                        original_question: None,
                        warning: None,
                        error: None,
                    };
                }
                TierResult::Agent { hints } => {
                    tracing::debug!(?hints, "Routed to agent tier");
                }
            }
        }

        // Step 2: semantic response cache.
        if !request.skip_cache && !has_history {
            if let Some(cache) = &self.cache {
                emit_status(events, "Checking memory for similar questions...");
                if let Some(hit) = cache.lookup(&question).await {
                    tracing::info!(similarity = hit.similarity, "Semantic cache hit");
                    return AnalyzeResponse {
                        question,
                        answer: hit.answer,
                        tool_calls: hit.tool_calls,
                        insights: hit.insights,
                        entities: hit.entities,
                        model: None,
                        turns_used: 0,
                        tier: None,
                        tier_name: None,
                        generated_sql: None,
                        routed: false,
                        cached: true,
                        similarity: Some(hit.similarity),
                        original_question: Some(hit.original_question),
                        warning: None,
                        error: None,
                    };
                }
            }
        }

        // Step 3: full agent.
        let Some(llm) = &self.llm else {
            return AnalyzeResponse {
                question,
                answer: NOT_CONFIGURED_ANSWER.to_string(),
                tool_calls: vec![],
                insights: vec![],
                entities: vec![],
                model: None,
                turns_used: 0,
                tier: None,
                tier_name: None,
                generated_sql: None,
                routed: false,
                cached: false,
                similarity: None,
                original_question: None,
                warning: None,
                error: Some(RunError::MissingApiKey),
            };
        };

        emit_status(events, "Starting analysis...");

        let mut registry = ToolRegistry::new(ToolContext::new(
            Arc::clone(&self.sql),
            self.config.sources.clone(),
            self.config.tool_results.clone(),
        ));
        handlers::register_all(&mut registry);

        let options = AgentOptions {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.llm.model.clone()),
            max_turns: request.max_turns.unwrap_or(self.config.llm.max_turns),
            max_tokens: self.config.llm.max_tokens,
            temperature: self.config.llm.temperature,
        };

        let outcome = run_agent(
            llm.as_ref(),
            &registry,
            &options,
            &question,
            &request.messages,
            events,
        )
        .await;

        // Only clean completions of fresh questions are worth remembering.
        if outcome.completed
            && !request.skip_cache
            && !has_history
            && !outcome.run.answer.is_empty()
        {
            if let Some(cache) = &self.cache {
                cache.store(&question, &outcome.run).await;
            }
        }

        AnalyzeResponse::from_run(question, outcome.run)
    }

    /// Legacy cross-source keyword search.
    pub async fn rag_search(
        &self,
        query: &str,
        sources: Option<Vec<SourceId>>,
        n_results: usize,
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> (Vec<neo_common::api::SearchResultItem>, Vec<String>) {
        search::search_sources(
            &self.sql,
            &self.config.sources,
            query,
            sources,
            n_results,
            date_from,
            date_to,
        )
        .await
    }

    /// Context-anchored single-shot Q&A (no tools).
    pub async fn rag_ask(&self, request: AskRequest) -> AskResponse {
        let Some(llm) = &self.llm else {
            return AskResponse {
                question: request.question,
                answer: "AI Q&A is not configured. Please set ANTHROPIC_API_KEY.".to_string(),
                sources: vec![],
                context_count: 0,
                model: None,
                error: Some(RunError::MissingApiKey),
            };
        };

        let context_docs = if request.skip_search {
            Vec::new()
        } else {
            let (docs, _) = self
                .rag_search(&request.question, None, request.n_context, None, None)
                .await;
            docs
        };

        // Follow-ups lean on conversation history instead of fresh context.
        if context_docs.is_empty() && request.messages.is_empty() {
            return AskResponse {
                question: request.question,
                answer: "I don't have any relevant documents in the knowledge base to answer \
                         this question. Try rephrasing or searching for related terms."
                    .to_string(),
                sources: vec![],
                context_count: 0,
                model: request.model,
                error: None,
            };
        }

        let current = if context_docs.is_empty() {
            request.question.clone()
        } else {
            format!(
                "CONTEXT:\n{}\n\nQUESTION: {}\n\nAnswer based ONLY on the context above. \
                 Cite sources by their document number [1], [2], etc.",
                search::format_context(&context_docs),
                request.question
            )
        };

        let mut messages: Vec<Message> = request
            .messages
            .iter()
            .map(|msg| {
                if msg.role == "assistant" {
                    Message::assistant_text(msg.content.clone())
                } else {
                    Message::user_text(msg.content.clone())
                }
            })
            .collect();
        messages.push(Message::user_text(current));

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| ASK_DEFAULT_MODEL.to_string());
        let params = ChatParams {
            model: &model,
            max_tokens: 1024,
            temperature: None,
            system: ASK_SYSTEM_PROMPT,
        };

        match llm.chat(params, &messages, &[]).await {
            Ok(response) => {
                let sources = context_docs
                    .iter()
                    .map(|doc| {
                        serde_json::json!({
                            "source": doc.source,
                            "title": doc.title,
                            "url": doc.url,
                            "metadata": doc.metadata,
                        })
                    })
                    .collect();
                AskResponse {
                    question: request.question,
                    answer: response.concatenated_text(),
                    sources,
                    context_count: context_docs.len(),
                    model: Some(model),
                    error: None,
                }
            }
            Err(e) => AskResponse {
                question: request.question,
                answer: format!("AI service error: {}", e),
                sources: vec![],
                context_count: context_docs.len(),
                model: Some(model),
                error: Some(RunError::ApiError),
            },
        }
    }

    /// Availability and table counts for every source, plus the entry
    /// counts and limits of both caches.
    pub async fn database_stats(&self) -> serde_json::Value {
        let databases = self.sql.database_stats().await;
        let response_cache = match &self.cache {
            Some(cache) => cache.stats().await,
            None => serde_json::json!({ "enabled": false }),
        };

        serde_json::json!({
            "databases": databases,
            "query_cache": self.sql.cache_stats(),
            "response_cache": response_cache,
        })
    }

    /// Debug passthrough: run one SELECT against a named source.
    pub async fn debug_query(&self, database: &str, query: &str) -> Result<QueryResult, NeoError> {
        let source: SourceId = database.parse()?;
        Ok(self.sql.execute(source, query, MAX_ROW_LIMIT, true).await?)
    }
}

fn emit_status(events: Option<&UnboundedSender<AgentEvent>>, message: &str) {
    if let Some(sender) = events {
        let _ = sender.send(AgentEvent::Status {
            message: message.to_string(),
        });
    }
}
