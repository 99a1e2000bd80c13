use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::sources::{SqlClient, SqlError, MAX_ROW_LIMIT};

use super::{clamp_limit, context, escape_like, shaped};

const PATENT_COLUMNS: &str = "id, patent_number, title, abstract, grant_date, filing_date, \
                              primary_assignee, cpc_codes, claims_count";

pub fn patents_sql(
    assignee: Option<&str>,
    inventor: Option<&str>,
    cpc_code: Option<&str>,
    days: Option<i64>,
    keyword: Option<&str>,
    limit: usize,
) -> String {
    let mut sql = format!("SELECT {} FROM patents WHERE 1=1", PATENT_COLUMNS);
    if let Some(assignee) = assignee {
        let a = escape_like(assignee);
        sql.push_str(&format!(" AND primary_assignee LIKE '%{a}%'"));
    }
    if let Some(inventor) = inventor {
        let i = escape_like(inventor);
        sql.push_str(&format!(
            " AND id IN (SELECT patent_id FROM inventors WHERE name LIKE '%{i}%')"
        ));
    }
    if let Some(cpc) = cpc_code {
        let c = escape_like(cpc);
        sql.push_str(&format!(" AND cpc_codes LIKE '%{c}%'"));
    }
    if let Some(days) = days {
        sql.push_str(&format!(
            " AND grant_date >= date('now', '-{} days')",
            days.max(0)
        ));
    }
    if let Some(keyword) = keyword {
        let k = escape_like(keyword);
        sql.push_str(&format!(
            " AND (title LIKE '%{k}%' OR abstract LIKE '%{k}%')"
        ));
    }
    sql.push_str(&format!(" ORDER BY grant_date DESC LIMIT {}", limit));
    sql
}

/// Search patents with filters, newest grants first.
pub async fn get_patents(
    sql: &SqlClient,
    assignee: Option<&str>,
    inventor: Option<&str>,
    cpc_code: Option<&str>,
    days: Option<i64>,
    keyword: Option<&str>,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let query = patents_sql(assignee, inventor, cpc_code, days, keyword, limit);
    let result = sql
        .execute(SourceId::Patents, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Patents matching the given filters, newest grant date first.",
            json!({
                "assignee": assignee,
                "inventor": inventor,
                "cpc_code": cpc_code,
                "days": days,
                "keyword": keyword,
            }),
            "CPC codes A61K and C12N cover most pharma and biotech filings.",
        ),
    ))
}

/// Portfolio summary for an assignee: stats plus up to 50 patents.
pub async fn get_patent_portfolio(sql: &SqlClient, assignee: &str) -> Result<Value, SqlError> {
    let a = escape_like(assignee);
    let summary_query = format!(
        "SELECT COUNT(*) as count, MIN(filing_date) as earliest, MAX(filing_date) as latest, \
         AVG(claims_count) as avg_claims \
         FROM patents WHERE primary_assignee LIKE '%{a}%'"
    );
    let patents_query = format!(
        "SELECT {} FROM patents WHERE primary_assignee LIKE '%{a}%' \
         ORDER BY grant_date DESC LIMIT 50",
        PATENT_COLUMNS
    );

    let (summary, patents) = tokio::join!(
        sql.execute(SourceId::Patents, &summary_query, MAX_ROW_LIMIT, true),
        sql.execute(SourceId::Patents, &patents_query, MAX_ROW_LIMIT, true),
    );
    let summary = summary?;
    let patents = patents?;

    let summary_row = summary
        .rows
        .into_iter()
        .next()
        .map(Value::Object)
        .unwrap_or_else(|| json!({}));

    Ok(json!({
        "assignee": assignee,
        "summary": summary_row,
        "patents": patents.rows.into_iter().map(Value::Object).collect::<Vec<_>>(),
        "_context": context(
            "Complete patent portfolio for the assignee.",
            json!({ "assignee": assignee }),
            "Filing cadence and claim counts indicate how actively the IP estate is maintained.",
        ),
    }))
}

/// Top inventors at a company by patent count.
pub async fn get_inventors_by_company(
    sql: &SqlClient,
    assignee: &str,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let a = escape_like(assignee);
    let query = format!(
        "SELECT i.name, COUNT(*) as patent_count \
         FROM inventors i JOIN patents p ON i.patent_id = p.id \
         WHERE p.primary_assignee LIKE '%{a}%' \
         GROUP BY i.name ORDER BY patent_count DESC LIMIT {limit}"
    );
    let result = sql
        .execute(SourceId::Patents, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Inventors with patents assigned to the company, by patent count.",
            json!({ "assignee": assignee, "limit": limit }),
            "Prolific inventors leaving an assignee often precede a spin-out.",
        ),
    ))
}

/// Keyword landscape search over title and abstract.
pub async fn search_patents_by_topic(
    sql: &SqlClient,
    keywords: &str,
    limit: Option<usize>,
) -> Result<Value, SqlError> {
    let limit = clamp_limit(limit, 20);
    let k = escape_like(keywords);
    let query = format!(
        "SELECT {} FROM patents \
         WHERE title LIKE '%{k}%' OR abstract LIKE '%{k}%' \
         ORDER BY grant_date DESC LIMIT {limit}",
        PATENT_COLUMNS
    );
    let result = sql
        .execute(SourceId::Patents, &query, MAX_ROW_LIMIT, true)
        .await?;

    Ok(shaped(
        result,
        context(
            "Patent landscape for the keyword search.",
            json!({ "keywords": keywords, "limit": limit }),
            "University-assigned patents in a landscape suggest the technology is still early.",
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patents_sql_without_filters_is_bare() {
        let sql = patents_sql(None, None, None, None, None, 20);
        assert!(sql.contains("WHERE 1=1 ORDER BY grant_date DESC LIMIT 20"));
    }

    #[test]
    fn inventor_filter_uses_subquery() {
        let sql = patents_sql(None, Some("Smith"), None, None, None, 20);
        assert!(sql.contains("id IN (SELECT patent_id FROM inventors WHERE name LIKE '%Smith%')"));
    }

    #[test]
    fn days_filter_is_numeric() {
        let sql = patents_sql(None, None, None, Some(90), None, 20);
        assert!(sql.contains("date('now', '-90 days')"));
        // Negative day windows collapse to zero rather than injecting.
        let sql = patents_sql(None, None, None, Some(-5), None, 20);
        assert!(sql.contains("date('now', '-0 days')"));
    }

    #[test]
    fn keyword_filter_covers_title_and_abstract() {
        let sql = patents_sql(None, None, None, None, Some("mRNA delivery"), 20);
        assert!(sql.contains("title LIKE '%mRNA delivery%' OR abstract LIKE '%mRNA delivery%'"));
    }

    #[test]
    fn ordering_is_fixed() {
        let sql = patents_sql(Some("Moderna"), None, None, None, None, 10);
        assert!(sql.ends_with("ORDER BY grant_date DESC LIMIT 10"));
    }
}
