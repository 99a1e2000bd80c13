use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use neo_common::api::{
    AnalyzeRequest, AskRequest, DebugQueryParams, SearchParams, SearchResponse,
};
use neo_common::config::EngineConfig;
use neo_common::types::SourceId;

use neo_engine::service::QuestionService;

/// Shared application state accessible from axum handlers.
struct AppState {
    service: Arc<QuestionService>,
    metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Engine starting");

    // Fail loudly on misconfiguration.
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    let service = Arc::new(QuestionService::new(config).await);
    tracing::info!("Question service ready — queries route directly to source services");

    let state = Arc::new(AppState {
        service,
        metrics_handle,
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/rag-search", get(rag_search_handler))
        .route("/api/rag-ask", post(rag_ask_handler))
        .route("/api/neo-analyze", post(analyze_handler))
        .route("/api/neo-analyze/stream", post(analyze_stream_handler))
        .route("/api/neo-db-stats", get(db_stats_handler))
        .route("/api/neo-query", get(debug_query_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!(port, "Engine listening");

    axum::serve(listener, app).await.expect("HTTP server error");
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "neo-engine" }))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

/// GET /api/rag-search — legacy cross-source keyword search.
async fn rag_search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<serde_json::Value>)> {
    if params.q.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Query must not be empty" })),
        ));
    }

    let sources = params.sources.as_deref().filter(|s| !s.is_empty()).map(|raw| {
        raw.split(',')
            .filter_map(|name| {
                let name = name.trim();
                match name.parse::<SourceId>() {
                    Ok(source) => Some(source),
                    Err(_) => {
                        tracing::warn!(source = name, "Ignoring unknown search source");
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
    });

    let (results, sources_searched) = state
        .service
        .rag_search(
            &params.q,
            sources,
            params.n_results,
            params.date_from.as_deref().filter(|s| !s.is_empty()),
            params.date_to.as_deref().filter(|s| !s.is_empty()),
        )
        .await;

    Ok(Json(SearchResponse {
        query: params.q,
        count: results.len(),
        results,
        sources_searched,
    }))
}

/// POST /api/rag-ask — context-anchored Q&A.
async fn rag_ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    Json(state.service.rag_ask(request).await)
}

/// POST /api/neo-analyze — the agent.
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    Json(state.service.ask(request).await)
}

/// POST /api/neo-analyze/stream — progress events as SSE, ending with a
/// single `complete` event carrying the full response.
async fn analyze_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.ask_streaming(request);
    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        Ok::<_, Infallible>(
            Event::default()
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data("{}")),
        )
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/neo-db-stats — source availability, table counts, and cache
/// statistics.
async fn db_stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.database_stats().await)
}

/// GET /api/neo-query — debug passthrough for one SELECT.
async fn debug_query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugQueryParams>,
) -> Result<Json<neo_common::types::QueryResult>, (StatusCode, Json<serde_json::Value>)> {
    state
        .service
        .debug_query(&params.database, &params.query)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        })
}
