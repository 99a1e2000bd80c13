use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use neo_common::types::SourceId;

use crate::semantic::researchers as semantic;
use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct GetResearchersArgs {
    #[serde(default)]
    min_h_index: Option<i64>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ProfileArgs {
    name: String,
}

#[derive(Deserialize)]
struct RisingStarsArgs {
    #[serde(default)]
    min_slope: Option<f64>,
    #[serde(default)]
    min_h_index: Option<i64>,
    #[serde(default)]
    max_h_index: Option<i64>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ByTopicArgs {
    topic: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "get_researchers",
            "Find researchers with optional filters, ranked by h-index. \
             Prefer this over raw SQL; it handles the JSON topic fields. \
             Returns id, name, h_index, slope, affiliations, topics, primary_category.",
            json!({
                "type": "object",
                "properties": {
                    "min_h_index": {"type": "integer", "description": "Minimum h-index"},
                    "topic": {"type": "string", "description": "Research topic to search for"},
                    "affiliation": {"type": "string", "description": "Institution to filter by"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: GetResearchersArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_researchers(
                    &ctx.sql,
                    args.min_h_index,
                    args.topic.as_deref(),
                    args.affiliation.as_deref(),
                    args.limit,
                )
                .await
                .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Researchers, &result);
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_researcher_profile",
            "Detailed profile for a researcher by (partial) name, including \
             publication metrics and a computed trajectory \
             (rising_star / growing / stable / established).",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Researcher name (partial match supported)"}
                },
                "required": ["name"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: ProfileArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_researcher_profile(&ctx.sql, &args.name)
                    .await
                    .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Researchers, &result);
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_rising_stars",
            "Researchers whose h-index is growing fastest. Slope above 3 is \
             very fast growth; the h-index window excludes already-established names.",
            json!({
                "type": "object",
                "properties": {
                    "min_slope": {"type": "number", "description": "Minimum h-index growth rate (default 2.0)"},
                    "min_h_index": {"type": "integer", "description": "Minimum current h-index (default 15)"},
                    "max_h_index": {"type": "integer", "description": "Maximum h-index (default 80)"},
                    "topic": {"type": "string", "description": "Filter by research topic"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: RisingStarsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_rising_stars(
                    &ctx.sql,
                    args.min_slope,
                    args.min_h_index,
                    args.max_h_index,
                    args.topic.as_deref(),
                    args.limit,
                )
                .await
                .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Researchers, &result);
                Ok(result)
            })
        }),
    );

    registry.register(
        tool(
            "get_researchers_by_topic",
            "Top researchers in a research area, ranked by h-index.",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Research topic, e.g. 'CRISPR', 'immunotherapy'"},
                    "limit": {"type": "integer", "description": "Max results (default 20)"}
                },
                "required": ["topic"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: ByTopicArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_researchers_by_topic(&ctx.sql, &args.topic, args.limit)
                    .await
                    .map_err(|e| e.to_string())?;
                ctx.record_result_rows(SourceId::Researchers, &result);
                Ok(result)
            })
        }),
    );
}
