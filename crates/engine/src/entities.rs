use std::collections::HashSet;

use serde_json::{Map, Value};

use neo_common::config::SourceUrls;
use neo_common::types::{Entity, EntityKind, SourceId};

use crate::router::format::{ellipsize, format_currency};

/// Display names are ellipsised at this many characters.
const MAX_NAME_CHARS: usize = 60;

/// Path segment under a source's base URL that serves its detail pages.
fn detail_segment(source: SourceId) -> Option<&'static str> {
    match source {
        SourceId::Researchers => Some("researcher"),
        SourceId::Patents => Some("patent"),
        SourceId::Grants => Some("grant"),
        SourceId::Policies => Some("bill"),
        SourceId::Portfolio => Some("company"),
        SourceId::MarketData => Some("trial"),
        SourceId::SecSentinel => None,
    }
}

/// Map result rows from a source to uniform linkable entities.
///
/// Each source has its own id column fallbacks and meta line; rows missing
/// an id are skipped. At most `max_rows` rows are considered.
pub fn extract_entities(
    source: SourceId,
    rows: &[Map<String, Value>],
    urls: &SourceUrls,
    max_rows: usize,
) -> Vec<Entity> {
    let Some(segment) = detail_segment(source) else {
        return Vec::new();
    };
    let base = urls.base_url(source);

    rows.iter()
        .take(max_rows)
        .filter_map(|row| entity_from_row(source, row, base, segment))
        .collect()
}

fn entity_from_row(
    source: SourceId,
    row: &Map<String, Value>,
    base: &str,
    segment: &str,
) -> Option<Entity> {
    let (kind, id, name, meta) = match source {
        SourceId::Researchers => {
            let id = scalar_string(row, &["id"])?;
            let name = scalar_string(row, &["name"])?;
            let h_index = scalar_string(row, &["h_index"]).unwrap_or_else(|| "?".to_string());
            (
                EntityKind::Researcher,
                id,
                name,
                format!("h-index: {}", h_index),
            )
        }
        SourceId::Patents => {
            let id = scalar_string(row, &["id", "patent_id"])?;
            let title =
                scalar_string(row, &["title"]).unwrap_or_else(|| "Untitled Patent".to_string());
            let number = scalar_string(row, &["patent_number"]).unwrap_or_default();
            (EntityKind::Patent, id, title, number)
        }
        SourceId::Grants => {
            let id = scalar_string(row, &["id", "grant_id"])?;
            let title =
                scalar_string(row, &["title"]).unwrap_or_else(|| "Untitled Grant".to_string());
            let meta = row
                .get("total_cost")
                .and_then(Value::as_f64)
                .filter(|cost| *cost > 0.0)
                .map(format_currency)
                .unwrap_or_default();
            (EntityKind::Grant, id, title, meta)
        }
        SourceId::Policies => {
            let id = scalar_string(row, &["id", "bill_id"])?;
            let title =
                scalar_string(row, &["title"]).unwrap_or_else(|| "Untitled Bill".to_string());
            let status = scalar_string(row, &["status"]).unwrap_or_default();
            (EntityKind::Policy, id, title, status)
        }
        SourceId::Portfolio => {
            let id = scalar_string(row, &["id", "company_id"])?;
            let name =
                scalar_string(row, &["name"]).unwrap_or_else(|| "Unknown Company".to_string());
            let modality = scalar_string(row, &["modality"]).unwrap_or_default();
            (EntityKind::Company, id, name, modality)
        }
        SourceId::MarketData => {
            let id = scalar_string(row, &["id", "nct_id"])?;
            let title = scalar_string(row, &["brief_title", "title"])
                .unwrap_or_else(|| "Untitled Trial".to_string());
            let status = scalar_string(row, &["status"]).unwrap_or_default();
            (EntityKind::ClinicalTrial, id, title, status)
        }
        SourceId::SecSentinel => return None,
    };

    Some(Entity {
        kind,
        id: id.clone(),
        name: ellipsize(&name, MAX_NAME_CHARS),
        url: format!("{}/{}/{}", base, segment, id),
        meta,
    })
}

/// First present, non-null scalar among the candidate columns, as a string.
fn scalar_string(row: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    for key in candidates {
        match row.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}

/// Remove duplicate entities by `(kind, id)`, keeping first occurrence.
pub fn dedup_entities(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen: HashSet<(EntityKind, String)> = HashSet::new();
    let mut unique = Vec::with_capacity(entities.len());
    for entity in entities {
        if seen.insert((entity.kind, entity.id.clone())) {
            unique.push(entity);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urls() -> SourceUrls {
        SourceUrls {
            researchers: "https://researchers.test".into(),
            patents: "https://patents.test".into(),
            grants: "https://grants.test".into(),
            policies: "https://policies.test".into(),
            portfolio: "https://portfolio.test".into(),
            market_data: "https://trials.test".into(),
            sec_sentinel: "https://sec.test".into(),
            sql_secret: String::new(),
        }
    }

    fn rows(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn researcher_rows_need_id_and_name() {
        let rows = rows(json!([
            {"id": "A123", "name": "Jane Park", "h_index": 45},
            {"name": "No Id"},
            {"id": "A124"},
        ]));
        let entities = extract_entities(SourceId::Researchers, &rows, &urls(), 10);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].url, "https://researchers.test/researcher/A123");
        assert_eq!(entities[0].meta, "h-index: 45");
    }

    #[test]
    fn patent_falls_back_to_patent_id() {
        let rows = rows(json!([
            {"patent_id": "P1", "title": "Lipid nanoparticle delivery", "patent_number": "US999"},
        ]));
        let entities = extract_entities(SourceId::Patents, &rows, &urls(), 10);
        assert_eq!(entities[0].id, "P1");
        assert_eq!(entities[0].meta, "US999");
        assert_eq!(entities[0].url, "https://patents.test/patent/P1");
    }

    #[test]
    fn grant_meta_formats_total_cost_as_currency() {
        let rows = rows(json!([
            {"id": "G1", "title": "CAR-T study", "total_cost": 1234567.0},
            {"id": "G2", "title": "No funding", "total_cost": 0},
        ]));
        let entities = extract_entities(SourceId::Grants, &rows, &urls(), 10);
        assert_eq!(entities[0].meta, "$1,234,567");
        assert_eq!(entities[1].meta, "");
    }

    #[test]
    fn trial_uses_nct_id_and_status() {
        let rows = rows(json!([
            {"nct_id": "NCT0001", "brief_title": "Phase 2 trial", "status": "RECRUITING"},
        ]));
        let entities = extract_entities(SourceId::MarketData, &rows, &urls(), 10);
        assert_eq!(entities[0].kind, EntityKind::ClinicalTrial);
        assert_eq!(entities[0].meta, "RECRUITING");
    }

    #[test]
    fn long_titles_are_ellipsised() {
        let title = "x".repeat(90);
        let rows = rows(json!([{"id": "P1", "title": title}]));
        let entities = extract_entities(SourceId::Patents, &rows, &urls(), 10);
        assert_eq!(entities[0].name.chars().count(), 63);
        assert!(entities[0].name.ends_with("..."));
    }

    #[test]
    fn row_cap_is_respected() {
        let many: Vec<Value> = (0..25)
            .map(|i| json!({"id": format!("R{}", i), "name": format!("Person {}", i)}))
            .collect();
        let rows = rows(Value::Array(many));
        let entities = extract_entities(SourceId::Researchers, &rows, &urls(), 10);
        assert_eq!(entities.len(), 10);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let make = |id: &str, name: &str| Entity {
            kind: EntityKind::Researcher,
            id: id.into(),
            name: name.into(),
            url: String::new(),
            meta: String::new(),
        };
        let deduped = dedup_entities(vec![
            make("A", "first"),
            make("B", "second"),
            make("A", "duplicate"),
            make("C", "third"),
        ]);
        let names: Vec<&str> = deduped.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn same_id_different_kind_is_not_a_duplicate() {
        let researcher = Entity {
            kind: EntityKind::Researcher,
            id: "X".into(),
            name: "r".into(),
            url: String::new(),
            meta: String::new(),
        };
        let company = Entity {
            kind: EntityKind::Company,
            id: "X".into(),
            name: "c".into(),
            url: String::new(),
            meta: String::new(),
        };
        assert_eq!(dedup_entities(vec![researcher, company]).len(), 2);
    }
}
