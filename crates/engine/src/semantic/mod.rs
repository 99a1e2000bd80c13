//! Typed query facades over the remote SQL sources.
//!
//! Each function builds validated SQL internally, executes it through the
//! shared [`SqlClient`], and returns a shaped JSON object enriched with a
//! `_context` block (description, applied criteria, one business insight).
//! Result ordering is fixed per function and part of the contract.

pub mod cross;
pub mod grants;
pub mod patents;
pub mod researchers;
pub mod sec;

use serde_json::{Map, Value};

use neo_common::types::QueryResult;

/// Escape a string bound into a SQL `LIKE '%…%'` literal.
///
/// Doubling single quotes keeps the value inside the literal; the `%`
/// wrapping happens at the call site, at the last moment. This is the only
/// string interpolation the layer performs — numeric filters are typed and
/// formatted from integers/floats.
pub fn escape_like(value: &str) -> String {
    value.replace('\'', "''")
}

/// Shape a raw result plus context into the layer's uniform envelope.
pub(crate) fn shaped(result: QueryResult, context: Value) -> Value {
    let mut object = Map::new();
    object.insert("columns".into(), Value::from(result.columns));
    object.insert(
        "rows".into(),
        Value::Array(result.rows.into_iter().map(Value::Object).collect()),
    );
    object.insert("row_count".into(), Value::from(result.row_count));
    object.insert("_context".into(), context);
    Value::Object(object)
}

/// Build the `_context` block shared by every facade.
pub(crate) fn context(description: &str, criteria: Value, insight: &str) -> Value {
    let mut object = Map::new();
    object.insert("description".into(), Value::from(description));
    if !criteria.is_null() {
        object.insert("criteria".into(), criteria);
    }
    object.insert("insight".into(), Value::from(insight));
    Value::Object(object)
}

/// Clamp a caller-supplied limit to a sane window.
pub(crate) fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_doubles_single_quotes() {
        assert_eq!(escape_like("parkinson's"), "parkinson''s");
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("a'b'c"), "a''b''c");
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(None, 20), 20);
        assert_eq!(clamp_limit(Some(5), 20), 5);
        assert_eq!(clamp_limit(Some(0), 20), 1);
        assert_eq!(clamp_limit(Some(10_000), 20), 100);
    }

    #[test]
    fn shaped_carries_context() {
        let result = QueryResult {
            columns: vec!["id".into()],
            rows: vec![],
            row_count: 0,
        };
        let value = shaped(result, context("test", Value::Null, "nothing"));
        assert_eq!(value["_context"]["description"], "test");
        assert_eq!(value["row_count"], 0);
        assert!(value["_context"].get("criteria").is_none());
    }
}
