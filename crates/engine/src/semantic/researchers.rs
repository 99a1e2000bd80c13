use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::sources::{SqlClient, SqlError, MAX_ROW_LIMIT};

use super::{clamp_limit, context, escape_like, shaped};

const RESEARCHER_COLUMNS: &str =
    "id, name, h_index, slope, affiliations, topics, primary_category, works_count, cited_by_count";

/// Researcher growth-trajectory classification from slope and h-index.
pub fn classify_trajectory(slope: f64, h_index: i64) -> &'static str {
    if slope > 3.0 && h_index < 60 {
        "rising_star"
    } else if slope > 1.5 {
        "growing"
    } else if slope > 0.0 {
        "stable"
    } else {
        "established"
    }
}

pub fn researchers_sql(
    min_h_index: Option<i64>,
    topic: Option<&str>,
    affiliation: Option<&str>,
    limit: usize,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM researchers WHERE 1=1",
        RESEARCHER_COLUMNS
    );
    if let Some(min) = min_h_index {
        sql.push_str(&format!(" AND h_index >= {}", min));
    }
    if let Some(topic) = topic {
        let t = escape_like(topic);
        sql.push_str(&format!(
            " AND (topics LIKE '%{t}%' OR primary_category LIKE '%{t}%')"
        ));
    }
    if let Some(affiliation) = affiliation {
        let a = escape_like(affiliation);
        sql.push_str(&format!(" AND affiliations LIKE '%{a}%'"));
    }
    sql.push_str(&format!(" ORDER BY h_index DESC LIMIT {}", limit));
    sql
}

pub fn rising_stars_sql(
    min_slope: f64,
    min_h_index: i64,
    max_h_index: i64,
    topic: Option<&str>,
    limit: usize,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM researchers WHERE slope >= {} AND h_index BETWEEN {} AND {}",
        RESEARCHER_COLUMNS, min_slope, min_h_index, max_h_index
    );
    if let Some(topic) = topic {
        let t = escape_like(topic);
        sql.push_str(&format!(
            " AND (topics LIKE '%{t}%' OR primary_category LIKE '%{t}%')"
        ));
    }
    sql.push_str(&format!(" ORDER BY slope DESC LIMIT {}", limit));
    sql
}

/// Find researchers with optional h-index/topic/affiliation filters,
/// ranked by h-index.
pub async fn get_researchers(
    sql: &SqlClient,
    min_h_index: Option<i64>,
    topic: Option<&str>,
    affiliation: Option<&str>,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let query = researchers_sql(min_h_index, topic, affiliation, limit);
    let result = sql
        .execute(SourceId::Researchers, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Researchers matching the given filters, ranked by h-index.",
            json!({
                "min_h_index": min_h_index,
                "topic": topic,
                "affiliation": affiliation,
                "limit": limit,
            }),
            "Slope is the h-index growth rate; above 2 marks a fast-rising trajectory.",
        ),
    ))
}

/// Detailed profile lookup by (partial) name, with trajectory analysis.
pub async fn get_researcher_profile(sql: &SqlClient, name: &str) -> Result<Value, SqlError> {
    let n = escape_like(name);
    let query = format!(
        "SELECT {} FROM researchers WHERE name LIKE '%{n}%' ORDER BY h_index DESC LIMIT 5",
        RESEARCHER_COLUMNS
    );
    let mut result = sql
        .execute(SourceId::Researchers, &query, MAX_ROW_LIMIT, true)
        .await?;

    for row in &mut result.rows {
        let slope = row.get("slope").and_then(Value::as_f64).unwrap_or(0.0);
        let h_index = row.get("h_index").and_then(Value::as_i64).unwrap_or(0);
        row.insert(
            "trajectory".into(),
            Value::from(classify_trajectory(slope, h_index)),
        );
    }

    Ok(shaped(
        result,
        context(
            "Researcher profile with computed career trajectory.",
            json!({ "name": name }),
            "rising_star = slope > 3 with h-index under 60; established = flat or declining.",
        ),
    ))
}

/// Fast-growing researchers ordered by slope.
pub async fn get_rising_stars(
    sql: &SqlClient,
    min_slope: Option<f64>,
    min_h_index: Option<i64>,
    max_h_index: Option<i64>,
    topic: Option<&str>,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let min_slope = min_slope.unwrap_or(2.0);
    let min_h_index = min_h_index.unwrap_or(15);
    let max_h_index = max_h_index.unwrap_or(80);
    let limit = clamp_limit(limit, 20);

    let query = rising_stars_sql(min_slope, min_h_index, max_h_index, topic, limit);
    let result = sql
        .execute(SourceId::Researchers, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Researchers whose h-index is growing faster than peers.",
            json!({
                "min_slope": min_slope,
                "min_h_index": min_h_index,
                "max_h_index": max_h_index,
                "topic": topic,
            }),
            "Mid-range h-index with high slope often signals talent before it becomes expensive.",
        ),
    ))
}

/// Top researchers in a topic area, ranked by h-index.
pub async fn get_researchers_by_topic(
    sql: &SqlClient,
    topic: &str,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let t = escape_like(topic);
    let query = format!(
        "SELECT {} FROM researchers \
         WHERE topics LIKE '%{t}%' OR primary_category LIKE '%{t}%' \
         ORDER BY h_index DESC LIMIT {limit}",
        RESEARCHER_COLUMNS
    );
    let result = sql
        .execute(SourceId::Researchers, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Top researchers in the topic area, ranked by h-index.",
            json!({ "topic": topic, "limit": limit }),
            "Topic matches search both the topics list and the primary category.",
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_thresholds() {
        assert_eq!(classify_trajectory(3.5, 40), "rising_star");
        assert_eq!(classify_trajectory(3.5, 70), "growing"); // high h-index excludes rising_star
        assert_eq!(classify_trajectory(2.0, 90), "growing");
        assert_eq!(classify_trajectory(1.0, 30), "stable");
        assert_eq!(classify_trajectory(0.0, 90), "established");
        assert_eq!(classify_trajectory(-1.0, 20), "established");
    }

    #[test]
    fn researchers_sql_omits_absent_filters() {
        let sql = researchers_sql(None, None, None, 20);
        assert!(!sql.contains("AND"));
        assert!(sql.ends_with("ORDER BY h_index DESC LIMIT 20"));
    }

    #[test]
    fn researchers_sql_applies_all_filters() {
        let sql = researchers_sql(Some(30), Some("CRISPR"), Some("MIT"), 10);
        assert!(sql.contains("h_index >= 30"));
        assert!(sql.contains("topics LIKE '%CRISPR%'"));
        assert!(sql.contains("affiliations LIKE '%MIT%'"));
        assert!(sql.ends_with("LIMIT 10"));
    }

    #[test]
    fn rising_stars_sql_uses_defaults() {
        let sql = rising_stars_sql(2.0, 15, 80, None, 20);
        assert!(sql.contains("slope >= 2"));
        assert!(sql.contains("h_index BETWEEN 15 AND 80"));
        assert!(sql.contains("ORDER BY slope DESC"));
    }

    #[test]
    fn quotes_in_topics_are_escaped() {
        let sql = researchers_sql(None, Some("alzheimer's"), None, 20);
        assert!(sql.contains("'%alzheimer''s%'"));
    }
}
