use serde::Serialize;

use neo_common::api::AnalyzeResponse;

/// Progress events published while a question is being answered.
/// The HTTP layer serializes these as server-sent events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Status { message: String },
    Tool { tool: String, message: String },
    ToolResult { tool: String, rows: usize },
    Complete { data: Box<AnalyzeResponse> },
}

/// Human-readable label for a tool dispatch, shown in streaming UIs.
pub fn status_label(tool: &str) -> String {
    let label = match tool {
        "get_researchers" => "Finding researchers...",
        "get_researcher_profile" => "Getting researcher profile...",
        "get_rising_stars" => "Finding rising star researchers...",
        "get_researchers_by_topic" => "Finding researchers by topic...",
        "get_patents" => "Searching patents...",
        "get_patent_portfolio" => "Analyzing patent portfolio...",
        "get_inventors_by_company" => "Finding key inventors...",
        "search_patents_by_topic" => "Searching patent landscape...",
        "get_grants" => "Searching grants...",
        "get_funding_summary" => "Analyzing funding...",
        "get_pis_by_organization" => "Finding principal investigators...",
        "get_grants_by_topic" => "Searching grant landscape...",
        "search_entity" => "Searching across all databases...",
        "get_company_profile" => "Building company profile...",
        "get_sec_filings" => "Searching SEC filings...",
        "get_companies_by_runway" => "Checking company runway data...",
        "get_insider_transactions" => "Searching insider transactions...",
        "get_runway_alerts" => "Checking runway alerts...",
        "query_researchers" => "Querying researchers database...",
        "query_patents" => "Querying patents database...",
        "query_grants" => "Querying grants database...",
        "query_policies" => "Querying policies database...",
        "query_portfolio" => "Querying portfolio database...",
        "query_market_data" => "Querying clinical trials database...",
        "list_tables" => "Exploring database schema...",
        "describe_table" => "Examining table structure...",
        "append_insight" => "Recording insight...",
        other => return format!("Running {}...", other),
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = AgentEvent::Status {
            message: "Thinking... (step 1)".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "Thinking... (step 1)");

        let event = AgentEvent::ToolResult {
            tool: "get_patents".into(),
            rows: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["rows"], 12);
    }

    #[test]
    fn unknown_tools_get_generic_label() {
        assert_eq!(status_label("get_patents"), "Searching patents...");
        assert_eq!(status_label("mystery"), "Running mystery...");
    }
}
