use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct InsightArgs {
    insight: String,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "append_insight",
            "Record a business insight discovered during analysis. Captured \
             insights are highlighted alongside the final response.",
            json!({
                "type": "object",
                "properties": {
                    "insight": {"type": "string", "description": "The business insight to record"}
                },
                "required": ["insight"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: InsightArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let total = ctx.push_insight(args.insight);
                Ok(json!({
                    "status": "insight recorded",
                    "total_insights": total,
                }))
            })
        }),
    );
}
