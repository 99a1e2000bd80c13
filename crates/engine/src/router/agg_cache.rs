use std::collections::HashMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use neo_common::types::SourceId;

use super::format::{format_scalar, group_thousands};

/// Router-local TTL for cached aggregations. Deliberately separate from the
/// SQL client's query cache (different invalidation rules).
const AGG_TTL: Duration = Duration::from_secs(300);

/// A "popular" aggregation the router can answer without the agent.
pub struct Aggregation {
    pub name: &'static str,
    pub regex: Regex,
    pub source: SourceId,
    pub sql: &'static str,
    pub title: &'static str,
}

pub static AGGREGATIONS: Lazy<Vec<Aggregation>> = Lazy::new(|| {
    let re = |p: &str| Regex::new(p).expect("valid aggregation pattern");
    vec![
        Aggregation {
            name: "trials_by_status",
            regex: re(r"trials? by status"),
            source: SourceId::MarketData,
            sql: "SELECT status, COUNT(*) as count FROM clinical_trials GROUP BY status ORDER BY count DESC LIMIT 20",
            title: "Clinical trials by status",
        },
        Aggregation {
            name: "trials_by_phase",
            regex: re(r"trials? by phase"),
            source: SourceId::MarketData,
            sql: "SELECT phase, COUNT(*) as count FROM clinical_trials GROUP BY phase ORDER BY count DESC LIMIT 20",
            title: "Clinical trials by phase",
        },
        Aggregation {
            name: "trials_by_sponsor",
            regex: re(r"trials? by sponsor"),
            source: SourceId::MarketData,
            sql: "SELECT sponsor, COUNT(*) as count FROM clinical_trials GROUP BY sponsor ORDER BY count DESC LIMIT 20",
            title: "Clinical trials by sponsor",
        },
        Aggregation {
            name: "grants_by_institute",
            regex: re(r"grants? by institute"),
            source: SourceId::Grants,
            sql: "SELECT institute, COUNT(*) as count, SUM(total_cost) as total_funding FROM grants GROUP BY institute ORDER BY total_funding DESC LIMIT 20",
            title: "Grants by institute",
        },
        Aggregation {
            name: "researchers_by_category",
            regex: re(r"researchers? by category"),
            source: SourceId::Researchers,
            sql: "SELECT primary_category, COUNT(*) as count FROM researchers GROUP BY primary_category ORDER BY count DESC LIMIT 20",
            title: "Researchers by category",
        },
    ]
});

/// Match a question against the aggregation catalog.
pub fn match_aggregation(question: &str) -> Option<&'static Aggregation> {
    let lowered = question.to_lowercase();
    AGGREGATIONS.iter().find(|agg| agg.regex.is_match(&lowered))
}

/// Render aggregation rows as a compact markdown list.
///
/// `columns` preserves the source's ordering: the first column is the group
/// key, the rest are metrics formatted with the tier-1 scalar rules.
pub fn format_aggregation(title: &str, columns: &[String], rows: &[Map<String, Value>]) -> String {
    if rows.is_empty() || columns.is_empty() {
        return format!("{}: no data.", title);
    }

    let group_col = &columns[0];
    let mut lines = vec![format!("**{}**", title)];
    for row in rows.iter().take(20) {
        let group = match row.get(group_col) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "(none)".to_string(),
            Some(other) => other.to_string(),
        };

        let metrics: Vec<String> = columns[1..]
            .iter()
            .map(|key| {
                let value = row.get(key).unwrap_or(&Value::Null);
                if key == "count" {
                    group_thousands(value.as_i64().unwrap_or(0))
                } else {
                    format_scalar(key, value)
                }
            })
            .collect();

        lines.push(format!("- {}: {}", group, metrics.join(" / ")));
    }
    lines.join("\n")
}

/// In-memory TTL cache keyed by aggregation name.
pub struct AggCache {
    entries: HashMap<&'static str, AggEntry>,
}

struct AggEntry {
    answer: String,
    data: Value,
    computed_at: Instant,
}

impl AggCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<(String, Value)> {
        let entry = self.entries.get(name)?;
        if entry.computed_at.elapsed() >= AGG_TTL {
            return None;
        }
        metrics::counter!("router.agg_cache.hit").increment(1);
        Some((entry.answer.clone(), entry.data.clone()))
    }

    pub fn insert(&mut self, name: &'static str, answer: String, data: Value) {
        self.entries.insert(
            name,
            AggEntry {
                answer,
                data,
                computed_at: Instant::now(),
            },
        );
    }
}

impl Default for AggCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_matches_canned_phrases() {
        assert_eq!(
            match_aggregation("Show me trials by status").unwrap().name,
            "trials_by_status"
        );
        assert_eq!(
            match_aggregation("grants by institute please").unwrap().name,
            "grants_by_institute"
        );
        assert!(match_aggregation("how many patents?").is_none());
    }

    #[test]
    fn aggregation_formatting_groups_counts() {
        let columns = vec!["status".to_string(), "count".to_string()];
        let rows: Vec<Map<String, Value>> = vec![
            json!({"status": "RECRUITING", "count": 12345})
                .as_object()
                .unwrap()
                .clone(),
            json!({"status": "COMPLETED", "count": 54321})
                .as_object()
                .unwrap()
                .clone(),
        ];
        let text = format_aggregation("Clinical trials by status", &columns, &rows);
        assert!(text.contains("RECRUITING: 12,345"));
        assert!(text.contains("COMPLETED: 54,321"));
    }

    #[test]
    fn cache_round_trip() {
        let mut cache = AggCache::new();
        assert!(cache.get("trials_by_status").is_none());
        cache.insert("trials_by_status", "answer".into(), json!([]));
        let (answer, _) = cache.get("trials_by_status").unwrap();
        assert_eq!(answer, "answer");
    }
}
