use serde_json::{json, Value};

use neo_common::types::SourceId;

use crate::sources::{SqlClient, SqlError, MAX_ROW_LIMIT};

use super::{context, escape_like};
use super::{grants::get_funding_summary, patents::get_patent_portfolio};

/// Presence probe for one source: row count plus a small sample.
async fn probe(
    sql: &SqlClient,
    source: SourceId,
    count_sql: String,
    sample_sql: String,
) -> Value {
    let (count, sample) = tokio::join!(
        sql.execute(source, &count_sql, MAX_ROW_LIMIT, true),
        sql.execute(source, &sample_sql, MAX_ROW_LIMIT, true),
    );

    match (count, sample) {
        (Ok(count), Ok(sample)) => {
            let n = count
                .rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            json!({
                "found": n > 0,
                "count": n,
                "sample": sample.rows.into_iter().map(Value::Object).collect::<Vec<_>>(),
            })
        }
        (Err(e), _) | (_, Err(e)) => json!({ "found": false, "error": e.to_string() }),
    }
}

/// Search for an entity across every database at once.
///
/// The four probes run concurrently; a failed source reports itself as
/// `{found: false, error}` instead of failing the whole search.
pub async fn search_entity(sql: &SqlClient, name: &str) -> Result<Value, SqlError> {
    let n = escape_like(name);

    let researchers = probe(
        sql,
        SourceId::Researchers,
        format!(
            "SELECT COUNT(*) as count FROM researchers \
             WHERE name LIKE '%{n}%' OR affiliations LIKE '%{n}%'"
        ),
        format!(
            "SELECT id, name, h_index, slope, primary_category FROM researchers \
             WHERE name LIKE '%{n}%' OR affiliations LIKE '%{n}%' \
             ORDER BY h_index DESC LIMIT 5"
        ),
    );
    let patents = probe(
        sql,
        SourceId::Patents,
        format!("SELECT COUNT(*) as count FROM patents WHERE primary_assignee LIKE '%{n}%'"),
        format!(
            "SELECT id, title, patent_number, grant_date FROM patents \
             WHERE primary_assignee LIKE '%{n}%' ORDER BY grant_date DESC LIMIT 5"
        ),
    );
    let grants = probe(
        sql,
        SourceId::Grants,
        format!("SELECT COUNT(*) as count FROM grants WHERE organization LIKE '%{n}%'"),
        format!(
            "SELECT id, title, total_cost, fiscal_year FROM grants \
             WHERE organization LIKE '%{n}%' ORDER BY total_cost DESC LIMIT 5"
        ),
    );
    let portfolio = probe(
        sql,
        SourceId::Portfolio,
        format!("SELECT COUNT(*) as count FROM companies WHERE name LIKE '%{n}%'"),
        format!(
            "SELECT id, name, modality, indications FROM companies \
             WHERE name LIKE '%{n}%' LIMIT 5"
        ),
    );

    let (researchers, patents, grants, portfolio) =
        tokio::join!(researchers, patents, grants, portfolio);

    Ok(json!({
        "name": name,
        "found_in": {
            "researchers": researchers,
            "patents": patents,
            "grants": grants,
            "portfolio": portfolio,
        },
        "_context": context(
            "Cross-database presence map for the entity.",
            json!({ "name": name }),
            "An entity present in patents and grants but not portfolio may be a sourcing lead.",
        ),
    }))
}

/// Unified company profile: patent portfolio, funding summary, and top
/// affiliated researchers, fetched concurrently.
pub async fn get_company_profile(sql: &SqlClient, name: &str) -> Result<Value, SqlError> {
    let n = escape_like(name);
    let researchers_query = format!(
        "SELECT id, name, h_index, slope, primary_category FROM researchers \
         WHERE affiliations LIKE '%{n}%' ORDER BY h_index DESC LIMIT 10"
    );

    let (patents, grants, researchers) = tokio::join!(
        get_patent_portfolio(sql, name),
        get_funding_summary(sql, name),
        sql.execute(SourceId::Researchers, &researchers_query, MAX_ROW_LIMIT, true),
    );

    // Partial failures degrade to an error marker per section.
    let patents = patents.unwrap_or_else(|e| json!({ "error": e.to_string() }));
    let grants = grants.unwrap_or_else(|e| json!({ "error": e.to_string() }));
    let researchers = match researchers {
        Ok(result) => json!({
            "top_researchers": result.rows.into_iter().map(Value::Object).collect::<Vec<_>>(),
        }),
        Err(e) => json!({ "error": e.to_string() }),
    };

    Ok(json!({
        "name": name,
        "patents": patents,
        "grants": grants,
        "researchers": researchers,
        "_context": context(
            "360-degree view of the company across patents, grants, and people.",
            json!({ "name": name }),
            "Patents plus federal grants plus affiliated researchers is a full innovation pipeline.",
        ),
    }))
}
