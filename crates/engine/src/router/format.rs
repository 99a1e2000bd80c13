use serde_json::{Map, Value};

use neo_common::types::SourceId;

/// Group an integer with comma thousands separators.
pub fn group_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Dollar amount, rounded to whole dollars, comma-grouped.
pub fn format_currency(amount: f64) -> String {
    format!("${}", group_thousands(amount.round() as i64))
}

/// Format a tier-1 scalar: currency when the column name says money,
/// comma-grouped for plain numbers, literal otherwise.
pub fn format_scalar(key: &str, value: &Value) -> String {
    if key.contains("funding") || key.contains("cost") {
        let amount = value.as_f64().unwrap_or(0.0);
        return format_currency(amount);
    }

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                group_thousands(i)
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    group_thousands(f as i64)
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Truncate to `max` chars with a trailing ellipsis, on char boundaries.
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max).collect();
    format!("{}...", truncated)
}

fn cell(row: &Map<String, Value>, key: &str, width: usize) -> String {
    let raw = match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    };
    ellipsize(&raw, width)
}

/// Render tier-2 rows as a source-appropriate markdown table or card.
pub fn format_rows(source: SourceId, rows: &[Map<String, Value>], max_rows: usize) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    match source {
        SourceId::Researchers => {
            let mut lines = vec![
                "| Name | H-Index | Slope | Category |".to_string(),
                "|------|---------|-------|----------|".to_string(),
            ];
            for row in rows.iter().take(max_rows) {
                lines.push(format!(
                    "| {} | {} | {} | {} |",
                    cell(row, "name", 30),
                    cell(row, "h_index", 10),
                    cell(row, "slope", 10),
                    cell(row, "primary_category", 20),
                ));
            }
            lines.join("\n")
        }
        SourceId::Patents => {
            let mut lines = vec![
                "| Title | Patent # | Filing Date |".to_string(),
                "|-------|----------|-------------|".to_string(),
            ];
            for row in rows.iter().take(max_rows) {
                lines.push(format!(
                    "| {} | {} | {} |",
                    cell(row, "title", 40),
                    cell(row, "patent_number", 20),
                    cell(row, "filing_date", 20),
                ));
            }
            lines.join("\n")
        }
        SourceId::Grants => {
            let mut lines = vec![
                "| Title | Amount | Institute |".to_string(),
                "|-------|--------|-----------|".to_string(),
            ];
            for row in rows.iter().take(max_rows) {
                let amount = row
                    .get("total_cost")
                    .and_then(Value::as_f64)
                    .filter(|cost| *cost > 0.0)
                    .map(format_currency)
                    .unwrap_or_else(|| "?".to_string());
                lines.push(format!(
                    "| {} | {} | {} |",
                    cell(row, "title", 40),
                    amount,
                    cell(row, "institute", 20),
                ));
            }
            lines.join("\n")
        }
        SourceId::MarketData => {
            let mut lines = vec![
                "| Title | Status | Phase | Sponsor |".to_string(),
                "|-------|--------|-------|---------|".to_string(),
            ];
            for row in rows.iter().take(max_rows) {
                lines.push(format!(
                    "| {} | {} | {} | {} |",
                    cell(row, "brief_title", 40),
                    cell(row, "status", 25),
                    cell(row, "phase", 15),
                    cell(row, "sponsor", 20),
                ));
            }
            lines.join("\n")
        }
        SourceId::Portfolio => {
            let row = &rows[0];
            format!(
                "**{}**\n- Modality: {}\n- Advantage: {}\n- Indications: {}",
                cell(row, "name", 60),
                cell(row, "modality", 60),
                cell(row, "competitive_advantage", 200),
                cell(row, "indications", 200),
            )
        }
        SourceId::Policies | SourceId::SecSentinel => {
            let preview: Vec<&Map<String, Value>> = rows.iter().take(5).collect();
            serde_json::to_string_pretty(&preview).unwrap_or_else(|_| "No results found.".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_rows(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(242_117), "242,117");
        assert_eq!(group_thousands(1_234_567_890), "1,234,567,890");
        assert_eq!(group_thousands(-5_000), "-5,000");
    }

    #[test]
    fn scalar_count_is_comma_grouped() {
        assert_eq!(format_scalar("count", &json!(242117)), "242,117");
    }

    #[test]
    fn scalar_funding_is_currency() {
        assert_eq!(
            format_scalar("total_funding", &json!(222000000000.0)),
            "$222,000,000,000"
        );
        assert_eq!(format_scalar("total_cost", &json!(0)), "$0");
    }

    #[test]
    fn scalar_string_is_literal() {
        assert_eq!(format_scalar("status", &json!("RECRUITING")), "RECRUITING");
    }

    #[test]
    fn researcher_table_has_four_columns() {
        let rows = to_rows(json!([
            {"name": "Jane Park", "h_index": 42, "slope": 3.5, "primary_category": "Immunology"},
        ]));
        let table = format_rows(SourceId::Researchers, &rows, 10);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| Name | H-Index | Slope | Category |");
        assert!(lines[2].contains("Jane Park"));
        assert!(lines[2].contains("Immunology"));
    }

    #[test]
    fn table_caps_rows() {
        let rows: Vec<Value> = (0..30)
            .map(|i| json!({"name": format!("R{}", i), "h_index": i, "slope": 1, "primary_category": "x"}))
            .collect();
        let table = format_rows(SourceId::Researchers, &to_rows(Value::Array(rows)), 10);
        // header + separator + 10 data rows
        assert_eq!(table.lines().count(), 12);
    }

    #[test]
    fn portfolio_renders_card() {
        let rows = to_rows(json!([
            {"name": "Epana", "modality": "T-cell Engager", "competitive_advantage": "CD38/CD19", "indications": "autoimmune"},
        ]));
        let card = format_rows(SourceId::Portfolio, &rows, 10);
        assert!(card.starts_with("**Epana**"));
        assert!(card.contains("- Modality: T-cell Engager"));
    }

    #[test]
    fn empty_rows_say_so() {
        assert_eq!(format_rows(SourceId::Grants, &[], 10), "No results found.");
    }

    #[test]
    fn long_cells_get_ellipsis() {
        let rows = to_rows(json!([
            {"title": "t".repeat(80), "patent_number": "US1", "filing_date": "2024-01-01"},
        ]));
        let table = format_rows(SourceId::Patents, &rows, 10);
        assert!(table.contains(&format!("{}...", "t".repeat(40))));
    }
}
