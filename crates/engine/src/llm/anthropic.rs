use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ContentBlock, LlmResponse, Message, Role, StopReason, TokenUsage, ToolDefinition};
use super::{ChatParams, LlmError};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Request wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

// ---------------------------------------------------------------------------
// Response wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: String,
    usage: WireUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(default)]
    r#type: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn to_wire(msg: &Message) -> WireMessage {
    WireMessage {
        role: match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: msg.content.clone(),
    }
}

fn parse_stop_reason(raw: &str) -> StopReason {
    match raw {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::Other,
    }
}

fn from_wire(resp: MessagesResponse) -> LlmResponse {
    let content = resp
        .content
        .into_iter()
        .map(|block| match block {
            ResponseBlock::Text { text } => ContentBlock::Text { text },
            ResponseBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
        })
        .collect();

    LlmResponse {
        content,
        stop_reason: parse_stop_reason(&resp.stop_reason),
        usage: TokenUsage {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        },
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// One Messages API call.
pub async fn send_messages(
    http: &reqwest::Client,
    api_key: &str,
    params: &ChatParams<'_>,
    messages: &[Message],
    tools: &[ToolDefinition],
) -> Result<LlmResponse, LlmError> {
    let start = std::time::Instant::now();

    let request = MessagesRequest {
        model: params.model,
        max_tokens: params.max_tokens,
        system: params.system,
        messages: messages.iter().map(to_wire).collect(),
        tools: tools
            .iter()
            .map(|t| WireTool {
                name: &t.name,
                description: &t.description,
                input_schema: &t.input_schema,
            })
            .collect(),
        temperature: params.temperature,
    };

    let response = http
        .post(ANTHROPIC_MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Http(e.to_string())
            }
        })?;

    let status = response.status();
    metrics::histogram!("llm.api.latency", "model" => params.model.to_string())
        .record(start.elapsed().as_secs_f64());

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Auth(format!("{}: {}", status, body)));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<WireError>(&body) {
            Ok(parsed) => {
                if parsed.error.r#type == "invalid_request_error"
                    && parsed.error.message.contains("context window")
                {
                    return Err(LlmError::ContextWindowExceeded(parsed.error.message));
                }
                parsed.error.message
            }
            Err(_) => body,
        };
        return Err(LlmError::Api(format!("{}: {}", status, message)));
    }

    let body: MessagesResponse = response
        .json()
        .await
        .map_err(|e| LlmError::Parse(format!("Failed to parse messages response: {}", e)))?;

    let parsed = from_wire(body);

    metrics::counter!("llm.api.input_tokens").increment(parsed.usage.input_tokens);
    metrics::counter!("llm.api.output_tokens").increment(parsed.usage.output_tokens);

    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_response() {
        let json = r#"{
            "content": [{"type": "text", "text": "392,000 grants totalling $222B."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 9}
        }"#;

        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        let parsed = from_wire(resp);

        assert_eq!(parsed.stop_reason, StopReason::EndTurn);
        assert_eq!(parsed.usage.input_tokens, 12);
        assert_eq!(parsed.concatenated_text(), "392,000 grants totalling $222B.");
    }

    #[test]
    fn parses_tool_use_response() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Looking for rising stars."},
                {"type": "tool_use", "id": "toolu_01", "name": "get_rising_stars",
                 "input": {"topic": "immunology", "min_slope": 2.5}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 120, "output_tokens": 40}
        }"#;

        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        let parsed = from_wire(resp);

        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
        let uses = parsed.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "get_rising_stars");
        assert_eq!(uses[0].2["topic"], "immunology");
    }

    #[test]
    fn unknown_stop_reason_maps_to_other() {
        assert_eq!(parse_stop_reason("pause_turn"), StopReason::Other);
        assert_eq!(parse_stop_reason("max_tokens"), StopReason::MaxTokens);
    }

    #[test]
    fn tool_result_round_trips_through_wire_message() {
        let msg = Message {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: "toolu_7".into(),
                content: r#"{"rows": []}"#.into(),
                is_error: None,
            }],
        };
        let wire = to_wire(&msg);
        assert_eq!(wire.role, "user");
        let json = serde_json::to_value(&wire.content).unwrap();
        assert_eq!(json[0]["type"], "tool_result");
        assert_eq!(json[0]["tool_use_id"], "toolu_7");
        assert!(json[0].get("is_error").is_none());
    }
}
