use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::sources::{SqlClient, SqlError, MAX_ROW_LIMIT};

use super::{clamp_limit, context, escape_like, shaped};

const GRANT_COLUMNS: &str =
    "id, title, agency, institute, mechanism, total_cost, fiscal_year, organization, pi_name";

#[allow(clippy::too_many_arguments)]
pub fn grants_sql(
    organization: Option<&str>,
    pi_name: Option<&str>,
    mechanism: Option<&str>,
    min_amount: Option<i64>,
    institute: Option<&str>,
    keyword: Option<&str>,
    limit: usize,
) -> String {
    let mut sql = format!("SELECT {} FROM grants WHERE 1=1", GRANT_COLUMNS);
    if let Some(organization) = organization {
        let o = escape_like(organization);
        sql.push_str(&format!(" AND organization LIKE '%{o}%'"));
    }
    if let Some(pi) = pi_name {
        let p = escape_like(pi);
        sql.push_str(&format!(" AND pi_name LIKE '%{p}%'"));
    }
    if let Some(mechanism) = mechanism {
        let m = escape_like(mechanism);
        sql.push_str(&format!(" AND mechanism LIKE '%{m}%'"));
    }
    if let Some(min) = min_amount {
        sql.push_str(&format!(" AND total_cost >= {}", min));
    }
    if let Some(institute) = institute {
        let i = escape_like(institute);
        sql.push_str(&format!(" AND institute LIKE '%{i}%'"));
    }
    if let Some(keyword) = keyword {
        let k = escape_like(keyword);
        sql.push_str(&format!(
            " AND (title LIKE '%{k}%' OR abstract LIKE '%{k}%')"
        ));
    }
    sql.push_str(&format!(" ORDER BY total_cost DESC LIMIT {}", limit));
    sql
}

/// Search grants with filters, largest award first.
#[allow(clippy::too_many_arguments)]
pub async fn get_grants(
    sql: &SqlClient,
    organization: Option<&str>,
    pi_name: Option<&str>,
    mechanism: Option<&str>,
    min_amount: Option<i64>,
    institute: Option<&str>,
    keyword: Option<&str>,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let query = grants_sql(
        organization,
        pi_name,
        mechanism,
        min_amount,
        institute,
        keyword,
        limit,
    );
    let result = sql
        .execute(SourceId::Grants, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Grants matching the given filters, largest total cost first.",
            json!({
                "organization": organization,
                "pi_name": pi_name,
                "mechanism": mechanism,
                "min_amount": min_amount,
                "institute": institute,
                "keyword": keyword,
            }),
            "R01s mark established programs; SBIR/STTR mark commercialization plays.",
        ),
    ))
}

/// Funding overview for an organization: totals, mechanism breakdown,
/// and the ten largest grants.
pub async fn get_funding_summary(sql: &SqlClient, organization: &str) -> Result<Value, SqlError> {
    let o = escape_like(organization);
    let summary_query = format!(
        "SELECT COUNT(*) as grant_count, SUM(total_cost) as total_funding, \
         AVG(total_cost) as avg_award, MAX(total_cost) as largest_award \
         FROM grants WHERE organization LIKE '%{o}%' AND total_cost > 0"
    );
    let mechanism_query = format!(
        "SELECT mechanism, COUNT(*) as count, SUM(total_cost) as total_funding \
         FROM grants WHERE organization LIKE '%{o}%' \
         GROUP BY mechanism ORDER BY total_funding DESC LIMIT 10"
    );
    let top_query = format!(
        "SELECT {} FROM grants WHERE organization LIKE '%{o}%' \
         ORDER BY total_cost DESC LIMIT 10",
        GRANT_COLUMNS
    );

    let (summary, by_mechanism, top_grants) = tokio::join!(
        sql.execute(SourceId::Grants, &summary_query, MAX_ROW_LIMIT, true),
        sql.execute(SourceId::Grants, &mechanism_query, MAX_ROW_LIMIT, true),
        sql.execute(SourceId::Grants, &top_query, MAX_ROW_LIMIT, true),
    );
    let summary = summary?;
    let by_mechanism = by_mechanism?;
    let top_grants = top_grants?;

    let summary_row = summary
        .rows
        .into_iter()
        .next()
        .map(Value::Object)
        .unwrap_or_else(|| json!({}));

    Ok(json!({
        "organization": organization,
        "summary": summary_row,
        "by_mechanism": by_mechanism.rows.into_iter().map(Value::Object).collect::<Vec<_>>(),
        "top_grants": top_grants.rows.into_iter().map(Value::Object).collect::<Vec<_>>(),
        "_context": context(
            "Funding overview for the organization.",
            json!({ "organization": organization }),
            "A mechanism mix skewed toward R01s signals durable federal support.",
        ),
    }))
}

/// Principal investigators at an organization, ranked by total funding.
pub async fn get_pis_by_organization(
    sql: &SqlClient,
    organization: &str,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let o = escape_like(organization);
    let query = format!(
        "SELECT pi_name, COUNT(*) as grant_count, SUM(total_cost) as total_funding \
         FROM grants WHERE organization LIKE '%{o}%' AND pi_name IS NOT NULL \
         GROUP BY pi_name ORDER BY total_funding DESC LIMIT {limit}"
    );
    let result = sql
        .execute(SourceId::Grants, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Principal investigators at the organization, by total funding.",
            json!({ "organization": organization, "limit": limit }),
            "The top handful of PIs usually hold the majority of an institution's funding.",
        ),
    ))
}

/// Keyword landscape search over grant titles and abstracts.
pub async fn get_grants_by_topic(
    sql: &SqlClient,
    keywords: &str,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let k = escape_like(keywords);
    let query = format!(
        "SELECT {} FROM grants \
         WHERE title LIKE '%{k}%' OR abstract LIKE '%{k}%' \
         ORDER BY total_cost DESC LIMIT {limit}",
        GRANT_COLUMNS
    );
    let result = sql
        .execute(SourceId::Grants, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Funding landscape for the keyword search.",
            json!({ "keywords": keywords, "limit": limit }),
            "Rising award totals year over year mark a field the agencies are leaning into.",
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_sql_without_filters_is_bare() {
        let sql = grants_sql(None, None, None, None, None, None, 20);
        assert!(sql.contains("WHERE 1=1 ORDER BY total_cost DESC LIMIT 20"));
    }

    #[test]
    fn min_amount_is_numeric_not_quoted() {
        let sql = grants_sql(None, None, None, Some(1_000_000), None, None, 20);
        assert!(sql.contains("total_cost >= 1000000"));
        assert!(!sql.contains("'1000000'"));
    }

    #[test]
    fn all_string_filters_are_wrapped_in_percents() {
        let sql = grants_sql(
            Some("Stanford"),
            Some("Lee"),
            Some("R01"),
            None,
            Some("NCI"),
            Some("CAR-T"),
            20,
        );
        for needle in [
            "organization LIKE '%Stanford%'",
            "pi_name LIKE '%Lee%'",
            "mechanism LIKE '%R01%'",
            "institute LIKE '%NCI%'",
            "title LIKE '%CAR-T%'",
        ] {
            assert!(sql.contains(needle), "missing {needle} in {sql}");
        }
    }

    #[test]
    fn ordering_is_fixed() {
        let sql = grants_sql(Some("MIT"), None, None, None, None, None, 5);
        assert!(sql.ends_with("ORDER BY total_cost DESC LIMIT 5"));
    }
}
