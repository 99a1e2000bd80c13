//! SEC source passthroughs.
//!
//! The SEC service owns these payload shapes (`critical_runway`,
//! `recent_s3_filings`, `insider_sells_at_risk`, …); they are forwarded to
//! the caller untouched.

use serde_json::Value;

use crate::sources::{SqlClient, SqlError};

fn push_param(params: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<String>) {
    if let Some(value) = value {
        params.push((key, value));
    }
}

/// Search SEC filings with optional runway context.
pub async fn get_sec_filings(
    sql: &SqlClient,
    ticker: Option<&str>,
    form_type: Option<&str>,
    days: Option<i64>,
    runway_status: Option<&str>,
) -> Result<Value, SqlError> {
    let mut params = Vec::new();
    push_param(&mut params, "ticker", ticker.map(str::to_string));
    push_param(&mut params, "form_type", form_type.map(str::to_string));
    push_param(&mut params, "days", days.map(|d| d.to_string()));
    push_param(
        &mut params,
        "runway_status",
        runway_status.map(str::to_string),
    );
    sql.semantic_endpoint("filings", &params).await
}

/// Companies ranked by months of cash runway.
pub async fn get_companies_by_runway(
    sql: &SqlClient,
    max_months: Option<f64>,
    min_months: Option<f64>,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let mut params = Vec::new();
    push_param(&mut params, "max_months", max_months.map(|v| v.to_string()));
    push_param(&mut params, "min_months", min_months.map(|v| v.to_string()));
    push_param(&mut params, "limit", limit.map(|v| v.to_string()));
    sql.semantic_endpoint("runway", &params).await
}

/// Insider (Form 4) transactions with runway linkage.
pub async fn get_insider_transactions(
    sql: &SqlClient,
    ticker: Option<&str>,
    insider_role: Option<&str>,
    transaction_type: Option<&str>,
    days: Option<i64>,
    min_value: Option<f64>,
) -> Result<Value, SqlError> {
    let mut params = Vec::new();
    push_param(&mut params, "ticker", ticker.map(str::to_string));
    push_param(
        &mut params,
        "insider_role",
        insider_role.map(str::to_string),
    );
    push_param(
        &mut params,
        "transaction_type",
        transaction_type.map(str::to_string),
    );
    push_param(&mut params, "days", days.map(|d| d.to_string()));
    push_param(&mut params, "min_value", min_value.map(|v| v.to_string()));
    sql.semantic_endpoint("insider", &params).await
}

/// Combined distress watchlist: critical runway + S-3 filings + insider sells.
pub async fn get_runway_alerts(sql: &SqlClient) -> Result<Value, SqlError> {
    sql.semantic_endpoint("alerts", &[]).await
}
