//! Integration tests for the question service.
//! All tests are `#[ignore]` — run with `cargo test -- --ignored` against
//! live source services (and ANTHROPIC_API_KEY for the agent-tier tests).

use neo_common::api::AnalyzeRequest;
use neo_common::config::EngineConfig;
use neo_engine::service::QuestionService;

fn request(question: &str) -> AnalyzeRequest {
    AnalyzeRequest {
        question: question.to_string(),
        model: None,
        max_turns: None,
        messages: vec![],
        skip_cache: false,
        skip_router: false,
    }
}

async fn service() -> QuestionService {
    let config = EngineConfig::from_env().expect("config");
    QuestionService::new(config).await
}

#[tokio::test]
#[ignore]
async fn tier1_count_answers_without_llm() {
    let service = service().await;
    let response = service.ask(request("How many patents?")).await;

    assert_eq!(response.tier, Some(1));
    assert!(response.routed);
    assert_eq!(response.turns_used, 0);
    assert!(response.model.is_none());
    // Comma-grouped integer.
    assert!(response.answer.chars().all(|c| c.is_ascii_digit() || c == ','));
    assert!(response.entities.is_empty());
}

#[tokio::test]
#[ignore]
async fn tier1_funding_formats_currency() {
    let service = service().await;
    let response = service.ask(request("total grant funding")).await;

    assert_eq!(response.tier, Some(1));
    assert!(response.answer.starts_with('$'));
}

#[tokio::test]
#[ignore]
async fn tier2_rising_stars_links_entities() {
    let service = service().await;
    let response = service.ask(request("rising stars in immunology")).await;

    assert_eq!(response.tier, Some(2));
    let sql = response.generated_sql.expect("tier 2 carries its SQL");
    assert!(sql.starts_with("SELECT id,"));
    assert!(sql.contains("ORDER BY slope DESC LIMIT 10"));
    assert!(response.answer.contains("| Name | H-Index | Slope | Category |"));
    assert!(response.entities.len() <= 10);
    for entity in &response.entities {
        assert!(entity.url.contains("/researcher/"));
    }
}

#[tokio::test]
#[ignore]
async fn agent_run_then_cache_hit() {
    let service = service().await;

    let first = service
        .ask(request("For Epana, which researchers should we talk to?"))
        .await;
    assert_eq!(first.tier, Some(3));
    assert!(!first.answer.is_empty());
    assert!(!first.tool_calls.is_empty());

    let second = service
        .ask(request("For Epana, who are the key researchers to contact?"))
        .await;
    assert!(second.cached);
    assert!(second.similarity.unwrap() >= 0.80);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.turns_used, 0);
}

#[tokio::test]
#[ignore]
async fn db_stats_reports_every_source_and_cache_counts() {
    let service = service().await;
    let stats = service.database_stats().await;

    for source in [
        "researchers",
        "patents",
        "grants",
        "policies",
        "portfolio",
        "market_data",
        "sec_sentinel",
    ] {
        assert!(
            stats["databases"].get(source).is_some(),
            "missing {source}"
        );
    }

    let query_cache = &stats["query_cache"];
    assert!(query_cache["entries"].as_i64().is_some());
    assert_eq!(query_cache["max_entries"], 100);

    let response_cache = &stats["response_cache"];
    assert!(
        response_cache.get("entries").is_some() || response_cache["enabled"] == false,
        "response cache stats missing: {response_cache}"
    );
}

#[tokio::test]
#[ignore]
async fn introspection_round_trip() {
    let service = service().await;
    let sql = service.sql();

    let tables = sql
        .list_tables(neo_common::SourceId::Patents)
        .await
        .expect("tables");
    assert!(!tables.is_empty());

    for table in &tables {
        let columns = sql
            .describe(neo_common::SourceId::Patents, &table.name)
            .await
            .expect("schema");
        assert!(!columns.is_empty(), "table {} has no columns", table.name);
    }
}
