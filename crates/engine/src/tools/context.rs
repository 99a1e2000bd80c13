use std::sync::{Arc, Mutex};

use serde_json::Value;

use neo_common::config::{SourceUrls, ToolResultLimits};
use neo_common::types::{Entity, SourceId};

use crate::entities::{dedup_entities, extract_entities};
use crate::sources::SqlClient;

/// Shared context available to every tool handler, plus the run-scoped
/// accumulators (insights, entities) the agent reads back at the end.
pub struct ToolContext {
    pub sql: Arc<SqlClient>,
    pub urls: SourceUrls,
    pub limits: ToolResultLimits,
    insights: Mutex<Vec<String>>,
    entities: Mutex<Vec<Entity>>,
}

impl ToolContext {
    pub fn new(sql: Arc<SqlClient>, urls: SourceUrls, limits: ToolResultLimits) -> Self {
        Self {
            sql,
            urls,
            limits,
            insights: Mutex::new(Vec::new()),
            entities: Mutex::new(Vec::new()),
        }
    }

    /// Record an insight; returns the running total.
    pub fn push_insight(&self, insight: String) -> usize {
        let mut insights = self.insights.lock().expect("insights poisoned");
        insights.push(insight);
        insights.len()
    }

    /// Extract entities from result-row JSON values and append them in order.
    pub fn record_rows(&self, source: SourceId, rows: &[Value]) {
        let maps: Vec<serde_json::Map<String, Value>> = rows
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect();
        let extracted = extract_entities(source, &maps, &self.urls, self.limits.max_entity_rows);
        if !extracted.is_empty() {
            let mut entities = self.entities.lock().expect("entities poisoned");
            entities.extend(extracted);
        }
    }

    /// Convenience: record from a `rows` array inside a shaped result.
    pub fn record_result_rows(&self, source: SourceId, shaped: &Value) {
        if let Some(rows) = shaped.get("rows").and_then(Value::as_array) {
            self.record_rows(source, rows);
        }
    }

    pub fn insights(&self) -> Vec<String> {
        self.insights.lock().expect("insights poisoned").clone()
    }

    /// All entities recorded so far, deduplicated in first-seen order.
    pub fn entities(&self) -> Vec<Entity> {
        let entities = self.entities.lock().expect("entities poisoned").clone();
        dedup_entities(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ToolContext {
        let urls = SourceUrls {
            researchers: "https://researchers.test".into(),
            patents: "https://patents.test".into(),
            grants: "https://grants.test".into(),
            policies: "https://policies.test".into(),
            portfolio: "https://portfolio.test".into(),
            market_data: "https://trials.test".into(),
            sec_sentinel: "https://sec.test".into(),
            sql_secret: String::new(),
        };
        let sql = Arc::new(SqlClient::new(reqwest::Client::new(), urls.clone()));
        ToolContext::new(sql, urls, ToolResultLimits::default())
    }

    #[test]
    fn insights_accumulate_in_order() {
        let ctx = context();
        assert_eq!(ctx.push_insight("first".into()), 1);
        assert_eq!(ctx.push_insight("second".into()), 2);
        assert_eq!(ctx.insights(), vec!["first", "second"]);
    }

    #[test]
    fn entities_dedup_across_recordings() {
        let ctx = context();
        let rows = vec![json!({"id": "R1", "name": "Jane Park", "h_index": 40})];
        ctx.record_rows(SourceId::Researchers, &rows);
        ctx.record_rows(SourceId::Researchers, &rows);
        assert_eq!(ctx.entities().len(), 1);
    }

    #[test]
    fn shaped_results_record_rows() {
        let ctx = context();
        let shaped = json!({
            "columns": ["id", "name"],
            "rows": [{"id": "R2", "name": "Ana Diaz", "h_index": 22}],
            "row_count": 1,
        });
        ctx.record_result_rows(SourceId::Researchers, &shaped);
        assert_eq!(ctx.entities().len(), 1);
        assert_eq!(ctx.entities()[0].id, "R2");
    }
}
