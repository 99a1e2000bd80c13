use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::semantic::sec as semantic;
use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct FilingsArgs {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    form_type: Option<String>,
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    runway_status: Option<String>,
}

#[derive(Deserialize)]
struct RunwayArgs {
    #[serde(default)]
    max_months: Option<f64>,
    #[serde(default)]
    min_months: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct InsiderArgs {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    insider_role: Option<String>,
    #[serde(default)]
    transaction_type: Option<String>,
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    min_value: Option<f64>,
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "get_sec_filings",
            "Search SEC filings (8-K, 10-K, 10-Q, S-1, S-3, Form 4) with \
             linked cash-runway context. Filter by runway_status to find \
             filings from distressed companies.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {"type": "string", "description": "Stock ticker symbol"},
                    "form_type": {"type": "string", "description": "Filing type: 8-K, 10-K, 10-Q, S-1, S-3, 4, SC 13D"},
                    "days": {"type": "integer", "description": "Look back N days (default 30)"},
                    "runway_status": {
                        "type": "string",
                        "enum": ["critical", "low", "moderate", "healthy"],
                        "description": "critical (<6mo), low (6-12mo), moderate (12-24mo), healthy (>24mo)"
                    }
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: FilingsArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::get_sec_filings(
                    &ctx.sql,
                    args.ticker.as_deref(),
                    args.form_type.as_deref(),
                    args.days,
                    args.runway_status.as_deref(),
                )
                .await
                .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "get_companies_by_runway",
            "Companies sorted by months of cash runway, lowest first. \
             Critical runway (under 6 months) often precedes fundraising or acquisition.",
            json!({
                "type": "object",
                "properties": {
                    "max_months": {"type": "number", "description": "Maximum runway in months"},
                    "min_months": {"type": "number", "description": "Minimum runway in months (default 0)"},
                    "limit": {"type": "integer", "description": "Max results (default 50)"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: RunwayArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::get_companies_by_runway(
                    &ctx.sql,
                    args.max_months,
                    args.min_months,
                    args.limit,
                )
                .await
                .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "get_insider_transactions",
            "Insider trading transactions (Form 4) with linked runway data. \
             Sells at low-runway companies are a bearish flag.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {"type": "string", "description": "Stock ticker symbol"},
                    "insider_role": {"type": "string", "description": "CEO, CFO, Director, …"},
                    "transaction_type": {"type": "string", "enum": ["buy", "sell"]},
                    "days": {"type": "integer", "description": "Look back N days (default 90)"},
                    "min_value": {"type": "number", "description": "Minimum transaction value in dollars"}
                },
                "required": []
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: InsiderArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                semantic::get_insider_transactions(
                    &ctx.sql,
                    args.ticker.as_deref(),
                    args.insider_role.as_deref(),
                    args.transaction_type.as_deref(),
                    args.days,
                    args.min_value,
                )
                .await
                .map_err(|e| e.to_string())
            })
        }),
    );

    registry.register(
        tool(
            "get_runway_alerts",
            "Distress watchlist: critical runway + recent S-3 filings + \
             insider sells at risk companies, combined into one alert set.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        Arc::new(|_args, ctx| {
            Box::pin(async move {
                semantic::get_runway_alerts(&ctx.sql)
                    .await
                    .map_err(|e| e.to_string())
            })
        }),
    );
}
