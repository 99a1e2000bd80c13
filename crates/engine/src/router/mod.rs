pub mod agg_cache;
pub mod format;
pub mod patterns;

use std::sync::{Arc, Mutex};

use serde_json::Value;

use neo_common::config::{SourceUrls, ToolResultLimits};
use neo_common::types::{Intent, RouteHint, RoutingHints, SourceId, TierResult};

use crate::entities::extract_entities;
use crate::sources::{SqlClient, MAX_ROW_LIMIT};

use agg_cache::{format_aggregation, match_aggregation, AggCache, Aggregation};
use format::{format_rows, format_scalar};
use patterns::{
    detect_intents, detect_sources, CrossDbPattern, Tier1Pattern, Tier2Pattern, CROSS_DB_PATTERNS,
    TIER1_PATTERNS, TIER2_PATTERNS,
};

/// What the pattern tables decided for a question, before any SQL runs.
/// Split out from execution so classification stays pure and testable.
enum Classification {
    Aggregation(&'static Aggregation),
    Tier1(&'static Tier1Pattern),
    Tier2 {
        pattern: &'static Tier2Pattern,
        sql: String,
    },
    CrossDb(&'static CrossDbPattern),
    Complex,
}

fn classify(lowered: &str) -> Classification {
    if let Some(agg) = match_aggregation(lowered) {
        return Classification::Aggregation(agg);
    }

    if let Some(pattern) = TIER1_PATTERNS.iter().find(|p| p.regex.is_match(lowered)) {
        return Classification::Tier1(pattern);
    }

    for pattern in TIER2_PATTERNS.iter() {
        if let Some(caps) = pattern.regex.captures(lowered) {
            return Classification::Tier2 {
                pattern,
                sql: (pattern.build)(&caps),
            };
        }
    }

    if let Some(pattern) = CROSS_DB_PATTERNS.iter().find(|p| p.regex.is_match(lowered)) {
        return Classification::CrossDb(pattern);
    }

    Classification::Complex
}

/// Three-tier question router.
///
/// Tier 1 and 2 answers run entirely without the LLM; tier 3 returns a
/// routing-hint bundle for the agent. Any SQL failure during tier 1/2
/// execution demotes the question to tier 3 rather than erroring.
pub struct Router {
    sql: Arc<SqlClient>,
    urls: SourceUrls,
    limits: ToolResultLimits,
    agg_cache: Mutex<AggCache>,
}

impl Router {
    pub fn new(sql: Arc<SqlClient>, urls: SourceUrls, limits: ToolResultLimits) -> Self {
        Self {
            sql,
            urls,
            limits,
            agg_cache: Mutex::new(AggCache::new()),
        }
    }

    /// Classify and, for tier 1/2, execute. Total: every question gets a
    /// `TierResult`.
    pub async fn route(&self, question: &str) -> TierResult {
        let lowered = question.trim().to_lowercase();
        let detected_sources = detect_sources(&lowered);
        let detected_intents = detect_intents(&lowered);

        if lowered.is_empty() {
            return self.agent_result(&lowered, detected_sources, detected_intents);
        }

        match classify(&lowered) {
            Classification::Aggregation(agg) => match self.run_aggregation(agg).await {
                Some(result) => result,
                None => {
                    metrics::counter!("router.demotions").increment(1);
                    self.agent_result(&lowered, detected_sources, detected_intents)
                }
            },
            Classification::Tier1(pattern) => match self.run_tier1(pattern).await {
                Some(result) => result,
                None => {
                    metrics::counter!("router.demotions").increment(1);
                    self.agent_result(&lowered, detected_sources, detected_intents)
                }
            },
            Classification::Tier2 { pattern, sql } => {
                match self.run_tier2(pattern.source, &sql).await {
                    Some(result) => result,
                    None => {
                        metrics::counter!("router.demotions").increment(1);
                        self.agent_result(&lowered, detected_sources, detected_intents)
                    }
                }
            }
            Classification::CrossDb(pattern) => {
                metrics::counter!("router.tier", "tier" => "3").increment(1);
                TierResult::Agent {
                    hints: RoutingHints {
                        detected_sources,
                        detected_intents,
                        hint: RouteHint::CrossDb,
                        suggested_queries: pattern
                            .suggested_queries
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    },
                }
            }
            Classification::Complex => self.agent_result(&lowered, detected_sources, detected_intents),
        }
    }

    async fn run_aggregation(&self, agg: &'static Aggregation) -> Option<TierResult> {
        {
            let cache = self.agg_cache.lock().expect("agg cache poisoned");
            if let Some((answer, data)) = cache.get(agg.name) {
                metrics::counter!("router.tier", "tier" => "1").increment(1);
                return Some(TierResult::Instant { answer, data });
            }
        }

        let result = match self.sql.execute(agg.source, agg.sql, MAX_ROW_LIMIT, true).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(aggregation = agg.name, error = %e, "Aggregation failed, demoting");
                return None;
            }
        };

        let answer = format_aggregation(agg.title, &result.columns, &result.rows);
        let data = Value::Array(result.rows.into_iter().map(Value::Object).collect());

        {
            let mut cache = self.agg_cache.lock().expect("agg cache poisoned");
            cache.insert(agg.name, answer.clone(), data.clone());
        }

        metrics::counter!("router.tier", "tier" => "1").increment(1);
        Some(TierResult::Instant { answer, data })
    }

    async fn run_tier1(&self, pattern: &Tier1Pattern) -> Option<TierResult> {
        let Some(sql) = pattern.sql else {
            // Special pattern: list the source's tables.
            let tables = match self.sql.list_tables(pattern.source).await {
                Ok(tables) => tables,
                Err(e) => {
                    tracing::warn!(source = %pattern.source, error = %e, "list_tables failed, demoting");
                    return None;
                }
            };
            let names: Vec<String> = tables.into_iter().map(|t| t.name).collect();
            metrics::counter!("router.tier", "tier" => "1").increment(1);
            return Some(TierResult::Instant {
                answer: format!(
                    "Tables in {} database: {}",
                    pattern.source,
                    names.join(", ")
                ),
                data: serde_json::json!({ "tables": names }),
            });
        };

        let result = match self.sql.execute(pattern.source, sql, MAX_ROW_LIMIT, true).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(source = %pattern.source, error = %e, "Tier 1 query failed, demoting");
                return None;
            }
        };

        let row = result.rows.first()?;
        let key = result
            .columns
            .first()
            .cloned()
            .or_else(|| row.keys().next().cloned())?;
        let value = row.get(&key).cloned().unwrap_or(Value::Null);

        metrics::counter!("router.tier", "tier" => "1").increment(1);
        Some(TierResult::Instant {
            answer: format_scalar(&key, &value),
            data: Value::Object(row.clone()),
        })
    }

    async fn run_tier2(&self, source: SourceId, sql: &str) -> Option<TierResult> {
        let result = match self.sql.execute(source, sql, MAX_ROW_LIMIT, true).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Tier 2 query failed, demoting");
                return None;
            }
        };

        if result.rows.is_empty() {
            // An empty template result is not an answer worth returning;
            // let the agent take a broader look.
            return None;
        }

        let entities = extract_entities(
            source,
            &result.rows,
            &self.urls,
            self.limits.max_entity_rows,
        );
        let answer = format_rows(source, &result.rows, self.limits.max_table_rows);

        metrics::counter!("router.tier", "tier" => "2").increment(1);
        Some(TierResult::Fast {
            answer,
            rows: result.rows,
            sql: sql.to_string(),
            entities,
        })
    }

    fn agent_result(
        &self,
        lowered: &str,
        detected_sources: Vec<SourceId>,
        detected_intents: Vec<Intent>,
    ) -> TierResult {
        metrics::counter!("router.tier", "tier" => "3").increment(1);

        // A demoted question may still carry a useful cross-DB hint.
        let cross = CROSS_DB_PATTERNS.iter().find(|p| p.regex.is_match(lowered));
        let (hint, suggested_queries) = match cross {
            Some(pattern) => (
                RouteHint::CrossDb,
                pattern
                    .suggested_queries
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            None => (
                if detected_intents.contains(&Intent::CrossDb) {
                    RouteHint::CrossDb
                } else {
                    RouteHint::Complex
                },
                Vec::new(),
            ),
        };

        TierResult::Agent {
            hints: RoutingHints {
                detected_sources,
                detected_intents,
                hint,
                suggested_queries,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_total_and_deterministic() {
        let questions = [
            "how many patents?",
            "total grant funding",
            "rising stars in immunology",
            "trials by status",
            "researchers with patents in oncology",
            "for epana, which researchers should we talk to?",
            "",
        ];
        for q in questions {
            let lowered = q.to_lowercase();
            let first = classification_tag(&classify(&lowered));
            let second = classification_tag(&classify(&lowered));
            assert_eq!(first, second, "classification must be stable for {q:?}");
        }
    }

    fn classification_tag(c: &Classification) -> &'static str {
        match c {
            Classification::Aggregation(_) => "aggregation",
            Classification::Tier1(_) => "tier1",
            Classification::Tier2 { .. } => "tier2",
            Classification::CrossDb(_) => "cross_db",
            Classification::Complex => "complex",
        }
    }

    #[test]
    fn count_question_classifies_tier1() {
        match classify("how many patents?") {
            Classification::Tier1(p) => {
                assert_eq!(p.source, SourceId::Patents);
                assert_eq!(p.sql, Some("SELECT COUNT(*) as count FROM patents"));
            }
            _ => panic!("expected tier 1"),
        }
    }

    #[test]
    fn funding_question_classifies_tier1() {
        match classify("total grant funding") {
            Classification::Tier1(p) => {
                assert!(p.sql.unwrap().contains("SUM(total_cost) as total_funding"));
            }
            _ => panic!("expected tier 1"),
        }
    }

    #[test]
    fn rising_stars_classifies_tier2_with_id() {
        match classify("rising stars in immunology") {
            Classification::Tier2 { pattern, sql } => {
                assert_eq!(pattern.source, SourceId::Researchers);
                assert!(sql.starts_with("SELECT id,"));
                assert!(sql.contains("ORDER BY slope DESC LIMIT 10"));
            }
            _ => panic!("expected tier 2"),
        }
    }

    #[test]
    fn aggregation_beats_tier2() {
        match classify("trials by sponsor") {
            Classification::Aggregation(agg) => assert_eq!(agg.name, "trials_by_sponsor"),
            _ => panic!("expected aggregation"),
        }
    }

    #[test]
    fn cross_db_phrase_classifies_with_hint() {
        match classify("researchers with patents") {
            Classification::CrossDb(p) => assert!(!p.suggested_queries.is_empty()),
            _ => panic!("expected cross-db"),
        }
    }

    #[test]
    fn unmatched_question_is_complex() {
        match classify("for epana, which researchers should we talk to?") {
            Classification::Complex => {}
            other => panic!("expected complex, got {}", classification_tag(&other)),
        }
    }
}
