use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::tools::registry::{ToolHandler, ToolRegistry};

use super::tool;

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

/// Default row cap for raw agent queries (the client still enforces 500).
const RAW_QUERY_LIMIT: usize = 100;

fn raw_query_handler(source: SourceId) -> ToolHandler {
    Arc::new(move |args, ctx| {
        Box::pin(async move {
            let args: QueryArgs =
                serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;

            let result = ctx
                .sql
                .execute(source, &args.query, RAW_QUERY_LIMIT, true)
                .await
                .map_err(|e| e.to_string())?;

            let rows: Vec<Value> = result.rows.into_iter().map(Value::Object).collect();
            ctx.record_rows(source, &rows);

            Ok(json!({
                "columns": result.columns,
                "rows": rows,
                "row_count": result.row_count,
            }))
        })
    })
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "query_researchers",
            "SQL SELECT against the researchers database. Tables: researchers \
             (id, name, orcid, h_index, i10_index, works_count, cited_by_count, \
             two_yr_citedness, slope, topics JSON, affiliations JSON, primary_category), \
             h_index_history (researcher_id, year, h_index), topic_categories. \
             Use for expertise search, rising stars (high slope), research trends.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::Researchers),
    );

    registry.register(
        tool(
            "query_patents",
            "SQL SELECT against the patents database. Tables: patents (id, \
             patent_number, title, abstract, grant_date, filing_date, primary_assignee, \
             cpc_codes, claims_count), inventors (patent_id, name, sequence), assignees, \
             cpc_classifications (patent_id, full_code, is_primary), portfolio_companies, \
             patent_company_relevance. Use for landscape analysis and competitive intelligence.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::Patents),
    );

    registry.register(
        tool(
            "query_grants",
            "SQL SELECT against the grants database. Tables: grants (id, title, \
             abstract, agency, institute, mechanism, total_cost, fiscal_year, organization, \
             pi_name), principal_investigators (grant_id, name, organization), \
             portfolio_companies, grant_company_relevance, entity_links (canonical_name, \
             sec_ticker, patent_assignee_name, grant_org_name, aliases JSON).",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::Grants),
    );

    registry.register(
        tool(
            "query_policies",
            "SQL SELECT against the policies database. Tables: bills (id, title, \
             summary, status, relevance_score, passage_likelihood, impact_summary), \
             analyses (bill_id, analysis_text). Use for tracking legislation that may \
             impact biotech.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::Policies),
    );

    registry.register(
        tool(
            "query_portfolio",
            "SQL SELECT against the portfolio database. Tables: companies (id, name, \
             ticker, modality, competitive_advantage, indications, fund), updates \
             (company_id, title, content, published_at). Use for portfolio company news \
             and positioning.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::Portfolio),
    );

    registry.register(
        tool(
            "query_market_data",
            "SQL SELECT against the clinical trials / FDA database. Tables: \
             clinical_trials (id, nct_id, brief_title, status, phase, conditions JSON, \
             interventions JSON, sponsor, enrollment, start_date), fda_events (id, \
             event_type, ticker, company, drug, indication, event_date). \
             Status values: RECRUITING, ACTIVE_NOT_RECRUITING, COMPLETED, TERMINATED, … \
             Phase values: PHASE1..PHASE4, EARLY_PHASE1, NA.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL SELECT query to execute"}
                },
                "required": ["query"]
            }),
        ),
        raw_query_handler(SourceId::MarketData),
    );
}
