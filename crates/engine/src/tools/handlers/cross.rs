use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::semantic::cross as semantic;
use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct NameArgs {
    name: String,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "search_entity",
            "Search for an entity (company, university, person) across all \
             databases at once and report where it appears, with counts and samples.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Entity name to search for"}
                },
                "required": ["name"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: NameArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::search_entity(&ctx.sql, &args.name)
                    .await
                    .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "get_company_profile",
            "Unified company profile: patents owned, grants received, and \
             affiliated researchers — a 360-degree view of the research and IP footprint.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Company name"}
                },
                "required": ["name"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: NameArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let result = semantic::get_company_profile(&ctx.sql, &args.name)
                    .await
                    .map_err(|e| e.to_string())?;

                // Entities come from the nested sections.
                if let Some(patents) = result
                    .pointer("/patents/patents")
                    .and_then(Value::as_array)
                {
                    ctx.record_rows(SourceId::Patents, patents);
                }
                if let Some(grants) = result
                    .pointer("/grants/top_grants")
                    .and_then(Value::as_array)
                {
                    ctx.record_rows(SourceId::Grants, grants);
                }
                if let Some(researchers) = result
                    .pointer("/researchers/top_researchers")
                    .and_then(Value::as_array)
                {
                    ctx.record_rows(SourceId::Researchers, researchers);
                }

                Ok(result)
            })
        }),
    );
}
