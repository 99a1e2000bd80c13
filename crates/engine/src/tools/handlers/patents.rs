use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::semantic::patents as semantic;
use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct GetPatentsArgs {
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    inventor: Option<String>,
    #[serde(default)]
    cpc_code: Option<String>,
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct AssigneeArgs {
    assignee: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct KeywordsArgs {
    keywords: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "get_patents",
            "Search patents with filters, newest grant date first. \
             Prefer this over raw SQL for patent lookups.",
            json!({
                "type": "object",
                "properties": {
                    "assignee": {"type": "string", "description": "Company/organization that owns the patent"},
                    "inventor": {"type": "string", "description": "Inventor name"},
                    "cpc_code": {"type": "string", "description": "CPC classification code, e.g. 'A61K' (pharma), 'C12N' (biotech)"},
                    "days": {"type": "integer", "description": "Only patents granted in the last N days"},
                    "keyword": {"type": "string", "description": "Search in title and abstract"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: GetPatentsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_patents(
                    &ctx.sql,
                    args.assignee.as_deref(),
                    args.inventor.as_deref(),
                    args.cpc_code.as_deref(),
                    args.days,
                    args.keyword.as_deref(),
                    args.limit,
                )
                .await
                .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Patents, &result);
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_patent_portfolio",
            "Complete patent portfolio for an assignee: summary statistics \
             (count, earliest/latest filing, average claims) plus up to 50 patents.",
            json!({
                "type": "object",
                "properties": {
                    "assignee": {"type": "string", "description": "Company/organization name"}
                },
                "required": ["assignee"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: AssigneeArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_patent_portfolio(&ctx.sql, &args.assignee)
                    .await
                    .map_err(|e| e.to_string())?;
                if let Some(patents) = result.get("patents").and_then(Value::as_array) {
                    ctx.record_rows(SourceId::Patents, patents);
                }
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_inventors_by_company",
            "Top inventors at a company by patent count.",
            json!({
                "type": "object",
                "properties": {
                    "assignee": {"type": "string", "description": "Company/organization name"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": ["assignee"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: AssigneeArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::get_inventors_by_company(&ctx.sql, &args.assignee, args.limit)
                    .await
                    .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "search_patents_by_topic",
            "Patent landscape search over title and abstract keywords.",
            json!({
                "type": "object",
                "properties": {
                    "keywords": {"type": "string", "description": "Keywords, e.g. 'mRNA delivery', 'CAR-T'"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": ["keywords"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: KeywordsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::search_patents_by_topic(&ctx.sql, &args.keywords, args.limit)
                    .await
                    .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Patents, &result);
                Ok(result)
            })
        }),
    );
}
