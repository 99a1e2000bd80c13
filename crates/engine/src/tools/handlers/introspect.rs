use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use neo_common::types::SourceId;

use crate::tools::registry::ToolRegistry;

use super::tool;

#[derive(Deserialize)]
struct ListTablesArgs {
    database: String,
}

#[derive(Deserialize)]
struct DescribeArgs {
    database: String,
    table_name: String,
}

const DATABASES: [&str; 6] = [
    "researchers",
    "patents",
    "grants",
    "policies",
    "portfolio",
    "market_data",
];

fn parse_database(name: &str) -> Result<SourceId, String> {
    if !DATABASES.contains(&name) {
        return Err(format!(
            "Unknown database: '{}'. Valid: {:?}",
            name, DATABASES
        ));
    }
    name.parse::<SourceId>()
        .map_err(|_| format!("Unknown database: '{}'. Valid: {:?}", name, DATABASES))
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        tool(
            "list_tables",
            "List all tables in a database. Use to discover what is available \
             before writing raw SQL.",
            json!({
                "type": "object",
                "properties": {
                    "database": {
                        "type": "string",
                        "enum": DATABASES,
                        "description": "Which database to list tables from"
                    }
                },
                "required": ["database"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: ListTablesArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let source = parse_database(&args.database)?;
                let tables = ctx
                    .sql
                    .list_tables(source)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(json!({ "tables": tables }))
            })
        }),
    );

    registry.register(
        tool(
            "describe_table",
            "Get the schema (columns and types) for a table. Use before \
             writing raw SQL against unfamiliar tables.",
            json!({
                "type": "object",
                "properties": {
                    "database": {
                        "type": "string",
                        "enum": DATABASES,
                        "description": "Which database the table is in"
                    },
                    "table_name": {"type": "string", "description": "Table to describe"}
                },
                "required": ["database", "table_name"]
            }),
        ),
        Arc::new(|args, ctx| {
            Box::pin(async move {
                let args: DescribeArgs =
                    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
                let source = parse_database(&args.database)?;
                let columns = ctx
                    .sql
                    .describe(source, &args.table_name)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(json!({ "table": args.table_name, "columns": columns }))
            })
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_parsing_rejects_sec() {
        // The SEC source has no raw-SQL introspection tool; it is reached
        // through its semantic endpoints only.
        assert!(parse_database("researchers").is_ok());
        assert!(parse_database("market_data").is_ok());
        assert!(parse_database("sec_sentinel").is_err());
        assert!(parse_database("nope").is_err());
    }
}
