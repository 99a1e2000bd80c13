use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::llm::ToolDefinition;

use super::context::ToolContext;

/// Handler signature: JSON args plus shared context in, JSON result or an
/// error message out.
pub type ToolHandler = Arc<
    dyn Fn(
            Value,
            Arc<ToolContext>,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>
        + Send
        + Sync,
>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Outcome of executing one tool call. `content` is always a JSON string —
/// failures become `{"error": …}` so the model can reason about them.
pub struct ToolExecution {
    pub content: String,
    pub is_error: bool,
}

/// Tool catalog and dispatcher in one structure: registering a tool binds
/// its schema definition and its handler together, so the set advertised to
/// the model and the set the dispatcher knows cannot drift apart.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    pub fn new(context: ToolContext) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            context: Arc::new(context),
        }
    }

    pub fn register(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        let name = definition.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { definition, handler })
            .is_none()
        {
            self.order.push(name);
        }
    }

    /// Definitions in registration order, for the model's tool catalog.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name.
    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolExecution {
        let start = std::time::Instant::now();

        let Some(tool) = self.tools.get(tool_name) else {
            tracing::warn!(tool = tool_name, "Unknown tool called");
            metrics::counter!("tools.execution.errors", "tool" => tool_name.to_string())
                .increment(1);
            return ToolExecution {
                content: error_json(&format!(
                    "Unknown tool: '{}'. Check the tool name and try again.",
                    tool_name
                )),
                is_error: true,
            };
        };

        tracing::info!(tool = tool_name, "Tool call started");
        let result = (tool.handler)(args, Arc::clone(&self.context)).await;

        let latency = start.elapsed().as_secs_f64();
        metrics::histogram!("tools.execution.latency", "tool" => tool_name.to_string())
            .record(latency);
        metrics::counter!("tools.execution.count", "tool" => tool_name.to_string()).increment(1);

        match result {
            Ok(value) => {
                let content = serde_json::to_string(&value)
                    .unwrap_or_else(|e| error_json(&format!("Failed to serialize result: {}", e)));
                tracing::info!(
                    tool = tool_name,
                    latency_s = latency,
                    result_len = content.len(),
                    "Tool call succeeded"
                );
                ToolExecution {
                    content,
                    is_error: false,
                }
            }
            Err(message) => {
                tracing::warn!(tool = tool_name, latency_s = latency, error = %message, "Tool call failed");
                metrics::counter!("tools.execution.errors", "tool" => tool_name.to_string())
                    .increment(1);
                ToolExecution {
                    content: error_json(&message),
                    is_error: true,
                }
            }
        }
    }
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_common::config::{SourceUrls, ToolResultLimits};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let urls = SourceUrls {
            researchers: "https://r.test".into(),
            patents: "https://p.test".into(),
            grants: "https://g.test".into(),
            policies: "https://pol.test".into(),
            portfolio: "https://port.test".into(),
            market_data: "https://m.test".into(),
            sec_sentinel: "https://s.test".into(),
            sql_secret: String::new(),
        };
        let sql = Arc::new(crate::sources::SqlClient::new(
            reqwest::Client::new(),
            urls.clone(),
        ));
        ToolRegistry::new(ToolContext::new(sql, urls, ToolResultLimits::default()))
    }

    fn echo_tool(name: &str) -> (ToolDefinition, ToolHandler) {
        (
            ToolDefinition {
                name: name.to_string(),
                description: "echo".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            },
            Arc::new(|args, _ctx| Box::pin(async move { Ok(args) })),
        )
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_json() {
        let registry = registry();
        let exec = registry.execute("no_such_tool", json!({})).await;
        assert!(exec.is_error);
        let parsed: Value = serde_json::from_str(&exec.content).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("no_such_tool"));
    }

    #[tokio::test]
    async fn handler_errors_become_error_json() {
        let mut registry = registry();
        let (def, _) = echo_tool("failing");
        registry.register(
            def,
            Arc::new(|_args, _ctx| Box::pin(async { Err("query timed out".to_string()) })),
        );

        let exec = registry.execute("failing", json!({})).await;
        assert!(exec.is_error);
        let parsed: Value = serde_json::from_str(&exec.content).unwrap();
        assert_eq!(parsed["error"], "query timed out");
    }

    #[tokio::test]
    async fn success_serializes_result() {
        let mut registry = registry();
        let (def, handler) = echo_tool("echo");
        registry.register(def, handler);

        let exec = registry.execute("echo", json!({"x": 1})).await;
        assert!(!exec.is_error);
        let parsed: Value = serde_json::from_str(&exec.content).unwrap();
        assert_eq!(parsed["x"], 1);
    }

    #[test]
    fn definitions_preserve_registration_order() {
        let mut registry = registry();
        for name in ["alpha", "beta", "gamma"] {
            let (def, handler) = echo_tool(name);
            registry.register(def, handler);
        }
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }
}
