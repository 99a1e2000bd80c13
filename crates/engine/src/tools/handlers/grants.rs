use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::semantic::grants as semantic;
use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct GetGrantsArgs {
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    pi_name: Option<String>,
    #[serde(default)]
    mechanism: Option<String>,
    #[serde(default)]
    min_amount: Option<i64>,
    #[serde(default)]
    institute: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct OrganizationArgs {
    organization: String,
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
            "get_grants",
            "Search grants with filters, largest total cost first. \
             Prefer this over raw SQL for grant lookups.",
            json!({
                "type": "object",
                "properties": {
                    "organization": {"type": "string", "description": "Institution receiving the grant"},
                    "pi_name": {"type": "string", "description": "Principal investigator name"},
                    "mechanism": {"type": "string", "description": "Grant type: R01, R21, SBIR, STTR, K, U, …"},
                    "min_amount": {"type": "integer", "description": "Minimum total funding amount"},
                    "institute": {"type": "string", "description": "NIH institute, e.g. 'NCI', 'NIAID'"},
                    "keyword": {"type": "string", "description": "Search in title and abstract"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: GetGrantsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_grants(
                    &ctx.sql,
                    args.organization.as_deref(),
                    args.pi_name.as_deref(),
                    args.mechanism.as_deref(),
                    args.min_amount,
                    args.institute.as_deref(),
                    args.keyword.as_deref(),
                    args.limit,
                )
                .await
                .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Grants, &result);
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_funding_summary",
            "Funding overview for an organization: totals, breakdown by \
             mechanism, and the ten largest grants.",
            json!({
                "type": "object",
                "properties": {
                    "organization": {"type": "string", "description": "Institution name"}
                },
                "required": ["organization"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: OrganizationArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_funding_summary(&ctx.sql, &args.organization)
                    .await
                    .map_err(|e| e.to_string())?;
                if let Some(top) = result.get("top_grants").and_then(Value::as_array) {
                    ctx.record_rows(SourceId::Grants, top);
                }
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_pis_by_organization",
            "Principal investigators at an institution ranked by total funding.",
            json!({
                "type": "object",
                "properties": {
                    "organization": {"type": "string", "description": "Institution name"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": ["organization"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: OrganizationArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::get_pis_by_organization(&ctx.sql, &args.organization, args.limit)
                    .await
                    .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "get_grants_by_topic",
            "Funding landscape search over grant titles and abstracts.",
            json!({
                "type": "object",
                "properties": {
                    "keywords": {"type": "string", "description": "Keywords, e.g. 'CRISPR', 'mRNA vaccine'"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": ["keywords"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: KeywordsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_grants_by_topic(&ctx.sql, &args.keywords, args.limit)
                    .await
                    .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Grants, &result);
                Ok(result)
            })
        }),
    );
}
