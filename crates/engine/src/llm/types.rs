use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in the running conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// Conversation role (matches the Anthropic wire format).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A content block in a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A tool advertised to the model: name, description, JSON-schema input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Parsed model response.
#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl LlmResponse {
    /// Concatenate every text block, in order.
    pub fn concatenated_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks in response order, as (id, name, input).
    pub fn tool_uses(&self) -> Vec<(String, String, Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped. Unknown wire values map to `Other` so the loop
/// can finalize instead of misreading them as a clean end of turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other,
}

/// Token usage from a single API call.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_text_joins_blocks_in_order() {
        let response = LlmResponse {
            content: vec![
                ContentBlock::Text {
                    text: "Key researchers: ".into(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "append_insight".into(),
                    input: serde_json::json!({}),
                },
                ContentBlock::Text {
                    text: "Jane Park.".into(),
                },
            ],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        };
        assert_eq!(response.concatenated_text(), "Key researchers: Jane Park.");
    }

    #[test]
    fn tool_uses_preserve_order() {
        let response = LlmResponse {
            content: vec![
                ContentBlock::ToolUse {
                    id: "toolu_a".into(),
                    name: "get_patents".into(),
                    input: serde_json::json!({"assignee": "Moderna"}),
                },
                ContentBlock::ToolUse {
                    id: "toolu_b".into(),
                    name: "get_grants".into(),
                    input: serde_json::json!({"organization": "Moderna"}),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        };
        let uses = response.tool_uses();
        assert_eq!(uses[0].0, "toolu_a");
        assert_eq!(uses[1].0, "toolu_b");
    }
}
