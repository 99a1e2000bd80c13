mod cross;
mod grants;
mod insight;
mod introspect;
mod patents;
mod raw_sql;
mod researchers;
mod sec;

use serde_json::Value;

use crate::llm::ToolDefinition;

use super::registry::ToolRegistry;

pub(crate) fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Register the full tool catalog: semantic functions first (the system
/// prompt tells the model to prefer them), then raw SQL, introspection,
/// and the insight recorder.
pub fn register_all(registry: &mut ToolRegistry) {
    researchers::register(registry);
    patents::register(registry);
    grants::register(registry);
    cross::register(registry);
    sec::register(registry);
    raw_sql::register(registry);
    introspect::register(registry);
    insight::register(registry);

    tracing::info!(tools = registry.len(), "Tool catalog registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::ToolContext;
    use neo_common::config::{SourceUrls, ToolResultLimits};
    use std::sync::Arc;

    fn full_registry() -> ToolRegistry {
        let urls = SourceUrls {
            researchers: "https://r.test".into(),
            patents: "https://p.test".into(),
            grants: "https://g.test".into(),
            policies: "https://pol.test".into(),
            portfolio: "https://port.test".into(),
            market_data: "https://m.test".into(),
            sec_sentinel: "https://s.test".into(),
            sql_secret: String::new(),
        };
        let sql = Arc::new(crate::sources::SqlClient::new(
            reqwest::Client::new(),
            urls.clone(),
        ));
        let mut registry =
            ToolRegistry::new(ToolContext::new(sql, urls, ToolResultLimits::default()));
        register_all(&mut registry);
        registry
    }

    #[test]
    fn catalog_is_the_canonical_superset() {
        let registry = full_registry();
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();

        for expected in [
            "get_researchers",
            "get_researcher_profile",
            "get_rising_stars",
            "get_researchers_by_topic",
            "get_patents",
            "get_patent_portfolio",
            "get_inventors_by_company",
            "search_patents_by_topic",
            "get_grants",
            "get_funding_summary",
            "get_pis_by_organization",
            "get_grants_by_topic",
            "search_entity",
            "get_company_profile",
            "get_sec_filings",
            "get_companies_by_runway",
            "get_insider_transactions",
            "get_runway_alerts",
            "query_researchers",
            "query_patents",
            "query_grants",
            "query_policies",
            "query_portfolio",
            "query_market_data",
            "list_tables",
            "describe_table",
            "append_insight",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
        assert_eq!(names.len(), 27);
    }

    #[test]
    fn every_definition_has_object_schema() {
        let registry = full_registry();
        for def in registry.definitions() {
            assert_eq!(
                def.input_schema["type"], "object",
                "{} schema must be an object",
                def.name
            );
            assert!(
                def.input_schema.get("properties").is_some(),
                "{} schema must declare properties",
                def.name
            );
            assert!(!def.description.is_empty());
        }
    }

    #[test]
    fn semantic_tools_precede_raw_sql() {
        let registry = full_registry();
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        let first_semantic = names.iter().position(|n| n == "get_researchers").unwrap();
        let first_raw = names.iter().position(|n| n == "query_researchers").unwrap();
        assert!(first_semantic < first_raw);
    }
}
