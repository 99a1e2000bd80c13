//! Legacy cross-source keyword search.
//!
//! Backs `GET /api/rag-search` and the context fetch for `/api/rag-ask`.
//! Fans a `LIKE` search out across the main table of each requested source
//! and maps hits to a uniform result item. A failed source drops out of the
//! result set instead of failing the search.

use serde_json::{json, Map, Value};

use neo_common::api::SearchResultItem;
use neo_common::config::SourceUrls;
use neo_common::types::SourceId;

use crate::router::format::ellipsize;
use crate::semantic::escape_like;
use crate::sources::{SqlClient, MAX_ROW_LIMIT};

const SNIPPET_CHARS: usize = 300;

/// Sources searched when the caller does not narrow the set.
pub const DEFAULT_SEARCH_SOURCES: [SourceId; 5] = [
    SourceId::Patents,
    SourceId::Grants,
    SourceId::Researchers,
    SourceId::Policies,
    SourceId::MarketData,
];

/// FDA calendar rows carry company names with a stray trailing backslash
/// from the upstream feed; strip it before display.
pub fn normalize_company_name(raw: &str) -> String {
    raw.trim_end_matches('\\').trim().to_string()
}

fn text(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn date_clause(column: &str, date_from: Option<&str>, date_to: Option<&str>) -> String {
    let mut clause = String::new();
    if let Some(from) = date_from {
        clause.push_str(&format!(" AND {} >= '{}'", column, escape_like(from)));
    }
    if let Some(to) = date_to {
        clause.push_str(&format!(" AND {} <= '{}'", column, escape_like(to)));
    }
    clause
}

fn search_sql(
    source: SourceId,
    term: &str,
    date_from: Option<&str>,
    date_to: Option<&str>,
    limit: usize,
) -> Option<String> {
    let t = escape_like(term);
    let sql = match source {
        SourceId::Researchers => format!(
            "SELECT id, name, h_index, slope, primary_category FROM researchers \
             WHERE name LIKE '%{t}%' OR topics LIKE '%{t}%' \
             ORDER BY h_index DESC LIMIT {limit}"
        ),
        SourceId::Patents => format!(
            "SELECT id, title, abstract, patent_number, grant_date, primary_assignee \
             FROM patents WHERE (title LIKE '%{t}%' OR abstract LIKE '%{t}%'){} \
             ORDER BY grant_date DESC LIMIT {limit}",
            date_clause("grant_date", date_from, date_to)
        ),
        SourceId::Grants => format!(
            "SELECT id, title, abstract, total_cost, institute, organization \
             FROM grants WHERE (title LIKE '%{t}%' OR abstract LIKE '%{t}%') \
             ORDER BY total_cost DESC LIMIT {limit}"
        ),
        SourceId::Policies => format!(
            "SELECT id, title, summary, status FROM bills \
             WHERE title LIKE '%{t}%' OR summary LIKE '%{t}%' LIMIT {limit}"
        ),
        SourceId::MarketData => format!(
            "SELECT id, event_type, ticker, company, drug, indication, event_date \
             FROM fda_events \
             WHERE (company LIKE '%{t}%' OR drug LIKE '%{t}%' OR indication LIKE '%{t}%'){} \
             ORDER BY event_date DESC LIMIT {limit}",
            date_clause("event_date", date_from, date_to)
        ),
        SourceId::Portfolio => format!(
            "SELECT id, name, ticker, modality, indications FROM companies \
             WHERE name LIKE '%{t}%' OR indications LIKE '%{t}%' LIMIT {limit}"
        ),
        SourceId::SecSentinel => return None,
    };
    Some(sql)
}

fn to_item(source: SourceId, row: &Map<String, Value>, urls: &SourceUrls) -> SearchResultItem {
    let base = urls.base_url(source);
    match source {
        SourceId::Researchers => SearchResultItem {
            source: source.to_string(),
            title: text(row, "name"),
            snippet: format!(
                "h-index {} | {}",
                text(row, "h_index"),
                text(row, "primary_category")
            ),
            url: Some(format!("{}/researcher/{}", base, text(row, "id"))),
            metadata: json!({ "h_index": row.get("h_index"), "slope": row.get("slope") }),
        },
        SourceId::Patents => SearchResultItem {
            source: source.to_string(),
            title: text(row, "title"),
            snippet: ellipsize(&text(row, "abstract"), SNIPPET_CHARS),
            url: Some(format!("{}/patent/{}", base, text(row, "id"))),
            metadata: json!({
                "patent_number": row.get("patent_number"),
                "assignee": row.get("primary_assignee"),
                "grant_date": row.get("grant_date"),
            }),
        },
        SourceId::Grants => SearchResultItem {
            source: source.to_string(),
            title: text(row, "title"),
            snippet: ellipsize(&text(row, "abstract"), SNIPPET_CHARS),
            url: Some(format!("{}/grant/{}", base, text(row, "id"))),
            metadata: json!({
                "total_cost": row.get("total_cost"),
                "institute": row.get("institute"),
                "organization": row.get("organization"),
            }),
        },
        SourceId::Policies => SearchResultItem {
            source: source.to_string(),
            title: text(row, "title"),
            snippet: ellipsize(&text(row, "summary"), SNIPPET_CHARS),
            url: Some(format!("{}/bill/{}", base, text(row, "id"))),
            metadata: json!({ "status": row.get("status") }),
        },
        SourceId::MarketData => {
            let company = normalize_company_name(&text(row, "company"));
            SearchResultItem {
                source: "fda_calendar".to_string(),
                title: format!("{}: {}", text(row, "event_type"), text(row, "drug")),
                snippet: format!(
                    "{} | {} | {}",
                    company,
                    text(row, "indication"),
                    text(row, "event_date")
                ),
                url: None,
                metadata: json!({
                    "company": company,
                    "ticker": row.get("ticker"),
                    "event_date": row.get("event_date"),
                }),
            }
        }
        SourceId::Portfolio | SourceId::SecSentinel => SearchResultItem {
            source: source.to_string(),
            title: text(row, "name"),
            snippet: text(row, "modality"),
            url: Some(format!("{}/company/{}", base, text(row, "id"))),
            metadata: json!({ "ticker": row.get("ticker") }),
        },
    }
}

/// Run the keyword fan-out. Returns the hits plus the names of the sources
/// actually searched.
pub async fn search_sources(
    sql: &SqlClient,
    urls: &SourceUrls,
    query: &str,
    sources: Option<Vec<SourceId>>,
    n_results: usize,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> (Vec<SearchResultItem>, Vec<String>) {
    let targets = sources.unwrap_or_else(|| DEFAULT_SEARCH_SOURCES.to_vec());
    let per_source = n_results.clamp(1, 50);

    let futures = targets.iter().filter_map(|&source| {
        let statement = search_sql(source, query, date_from, date_to, per_source)?;
        Some(async move {
            match sql.execute(source, &statement, MAX_ROW_LIMIT, true).await {
                Ok(result) => result
                    .rows
                    .iter()
                    .map(|row| to_item(source, row, urls))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Search fan-out source failed");
                    Vec::new()
                }
            }
        })
    });

    let mut results: Vec<SearchResultItem> = futures::future::join_all(futures)
        .await
        .into_iter()
        .flatten()
        .collect();
    results.truncate(per_source);

    let searched = targets.iter().map(|s| s.to_string()).collect();
    (results, searched)
}

/// Format search hits as a numbered context block for the ask endpoint.
pub fn format_context(docs: &[SearchResultItem]) -> String {
    if docs.is_empty() {
        return "No relevant documents found.".to_string();
    }

    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[{}] [{}] {}\n{}",
                i + 1,
                doc.source.to_uppercase(),
                doc.title,
                doc.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urls() -> SourceUrls {
        SourceUrls {
            researchers: "https://r.test".into(),
            patents: "https://p.test".into(),
            grants: "https://g.test".into(),
            policies: "https://pol.test".into(),
            portfolio: "https://port.test".into(),
            market_data: "https://m.test".into(),
            sec_sentinel: "https://s.test".into(),
            sql_secret: String::new(),
        }
    }

    #[test]
    fn company_normalization_strips_trailing_backslash() {
        assert_eq!(normalize_company_name("Acme Bio\\"), "Acme Bio");
        assert_eq!(normalize_company_name("Acme Bio \\"), "Acme Bio");
        assert_eq!(normalize_company_name("Plain Co"), "Plain Co");
    }

    #[test]
    fn search_sql_covers_default_sources() {
        for source in DEFAULT_SEARCH_SOURCES {
            let sql = search_sql(source, "crispr", None, None, 10).unwrap();
            assert!(sql.to_uppercase().starts_with("SELECT"));
            assert!(sql.contains("'%crispr%'"));
        }
        assert!(search_sql(SourceId::SecSentinel, "x", None, None, 10).is_none());
    }

    #[test]
    fn date_filters_apply_where_supported() {
        let sql = search_sql(SourceId::Patents, "gene", Some("2024-01-01"), None, 10).unwrap();
        assert!(sql.contains("grant_date >= '2024-01-01'"));

        let sql = search_sql(
            SourceId::MarketData,
            "obesity",
            Some("2024-01-01"),
            Some("2024-06-30"),
            10,
        )
        .unwrap();
        assert!(sql.contains("event_date >= '2024-01-01'"));
        assert!(sql.contains("event_date <= '2024-06-30'"));
    }

    #[test]
    fn fda_rows_map_with_normalized_company() {
        let row = json!({
            "id": 7,
            "event_type": "PDUFA",
            "company": "Acme Bio\\",
            "drug": "ACM-101",
            "indication": "obesity",
            "event_date": "2025-03-01",
        });
        let item = to_item(
            SourceId::MarketData,
            row.as_object().unwrap(),
            &urls(),
        );
        assert_eq!(item.source, "fda_calendar");
        assert_eq!(item.title, "PDUFA: ACM-101");
        assert!(item.snippet.starts_with("Acme Bio |"));
        assert_eq!(item.metadata["company"], "Acme Bio");
    }

    #[test]
    fn context_block_numbers_documents() {
        let docs = vec![
            SearchResultItem {
                source: "patents".into(),
                title: "Gene editing system".into(),
                snippet: "A method for editing genes.".into(),
                url: None,
                metadata: json!({}),
            },
            SearchResultItem {
                source: "grants".into(),
                title: "CRISPR delivery".into(),
                snippet: "Funded work.".into(),
                url: None,
                metadata: json!({}),
            },
        ];
        let context = format_context(&docs);
        assert!(context.contains("[1] [PATENTS] Gene editing system"));
        assert!(context.contains("[2] [GRANTS] CRISPR delivery"));
        assert!(context.contains("---"));
    }

    #[test]
    fn empty_context_has_placeholder() {
        assert_eq!(format_context(&[]), "No relevant documents found.");
    }
}
