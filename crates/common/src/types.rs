use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag identifying one of the remote structured data sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Researchers,
    Patents,
    Grants,
    Policies,
    Portfolio,
    MarketData,
    SecSentinel,
}

impl SourceId {
    pub const ALL: [SourceId; 7] = [
        SourceId::Researchers,
        SourceId::Patents,
        SourceId::Grants,
        SourceId::Policies,
        SourceId::Portfolio,
        SourceId::MarketData,
        SourceId::SecSentinel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Researchers => "researchers",
            SourceId::Patents => "patents",
            SourceId::Grants => "grants",
            SourceId::Policies => "policies",
            SourceId::Portfolio => "portfolio",
            SourceId::MarketData => "market_data",
            SourceId::SecSentinel => "sec_sentinel",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = crate::NeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researchers" => Ok(SourceId::Researchers),
            "patents" => Ok(SourceId::Patents),
            "grants" => Ok(SourceId::Grants),
            "policies" => Ok(SourceId::Policies),
            "portfolio" => Ok(SourceId::Portfolio),
            "market_data" => Ok(SourceId::MarketData),
            "sec_sentinel" => Ok(SourceId::SecSentinel),
            other => Err(crate::NeoError::UnknownSource(other.to_string())),
        }
    }
}

/// Result of a SELECT executed against a remote source.
/// Column order and row order are preserved as returned by the source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub row_count: usize,
}

/// Linkable entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Researcher,
    Patent,
    Grant,
    Policy,
    Company,
    ClinicalTrial,
}

/// A linkable source entity extracted from query results.
/// Unique within a run by `(kind, id)`; first occurrence wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub meta: String,
}

/// One tool invocation recorded during an agent run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub input: Value,
    /// First 500 chars of the JSON result.
    pub result_preview: String,
}

/// Terminal but non-error conditions of an agent run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunWarning {
    MaxTurnsExceeded,
}

/// Error conditions carried in the response body rather than as HTTP 5xx.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunError {
    MissingApiKey,
    ApiError,
}

/// Completed agent run: final answer plus the accumulated trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRun {
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub insights: Vec<String>,
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub turns_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<RunWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

/// Question intents detected by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Count,
    List,
    TopN,
    Compare,
    Lookup,
    Aggregate,
    Filter,
    CrossDb,
}

/// Why a question was escalated to the agent tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteHint {
    Complex,
    CrossDb,
}

/// Routing context handed to the agent tier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingHints {
    pub detected_sources: Vec<SourceId>,
    pub detected_intents: Vec<Intent>,
    pub hint: RouteHint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_queries: Vec<String>,
}

/// Outcome of routing a question.
#[derive(Clone, Debug)]
pub enum TierResult {
    /// Tier 1 — single canned scalar or table listing, no LLM.
    Instant { answer: String, data: Value },
    /// Tier 2 — parameterized template with entity extraction, no LLM.
    Fast {
        answer: String,
        rows: Vec<serde_json::Map<String, Value>>,
        sql: String,
        entities: Vec<Entity>,
    },
    /// Tier 3 — needs the full agent.
    Agent { hints: RoutingHints },
}

impl TierResult {
    pub fn tier(&self) -> u8 {
        match self {
            TierResult::Instant { .. } => 1,
            TierResult::Fast { .. } => 2,
            TierResult::Agent { .. } => 3,
        }
    }

    pub fn tier_name(&self) -> &'static str {
        match self {
            TierResult::Instant { .. } => "instant",
            TierResult::Fast { .. } => "fast",
            TierResult::Agent { .. } => "agent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_round_trip() {
        for source in SourceId::ALL {
            assert_eq!(source.as_str().parse::<SourceId>().unwrap(), source);
        }
        assert!("bogus".parse::<SourceId>().is_err());
    }

    #[test]
    fn entity_serializes_kind_as_type() {
        let entity = Entity {
            kind: EntityKind::ClinicalTrial,
            id: "NCT01234567".into(),
            name: "Phase 2 study".into(),
            url: "https://example.org/trial/NCT01234567".into(),
            meta: "RECRUITING".into(),
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "clinical_trial");
        assert_eq!(json["id"], "NCT01234567");
    }

    #[test]
    fn run_warning_wire_format() {
        let json = serde_json::to_value(RunWarning::MaxTurnsExceeded).unwrap();
        assert_eq!(json, "max_turns_exceeded");
    }
}
