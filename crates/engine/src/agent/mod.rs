pub mod events;

use tokio::sync::mpsc::UnboundedSender;

use neo_common::api::ChatMessage;
use neo_common::types::{AgentRun, RunError, RunWarning, ToolCallRecord};

use crate::llm::{ChatParams, ContentBlock, LlmCaller, Message, Role, StopReason, ToolDefinition};
use crate::router::format::ellipsize;
use crate::tools::ToolRegistry;

use events::{status_label, AgentEvent};

/// System prompt for the SQL agent tier.
pub const AGENT_SYSTEM_PROMPT: &str = "\
You are Neo, a senior biotech/deeptech analyst for a venture research team.

You have live access to 6 production databases through semantic functions (preferred) and raw SQL.

## TOOL PRIORITY
PREFER semantic functions over raw SQL. They are faster, pre-validated, and include business context:
- SEC: get_sec_filings, get_companies_by_runway, get_insider_transactions, get_runway_alerts
- Researchers: get_researchers, get_researcher_profile, get_rising_stars, get_researchers_by_topic
- Patents: get_patents, get_patent_portfolio, get_inventors_by_company, search_patents_by_topic
- Grants: get_grants, get_funding_summary, get_pis_by_organization, get_grants_by_topic
- Cross-database: search_entity (find an entity everywhere), get_company_profile (360-degree view)
Fall back to query_researchers / query_patents / query_grants / query_policies / query_portfolio /
query_market_data for anything the semantic functions do not cover, and use list_tables /
describe_table to explore schemas first. Record key findings with append_insight.

## DATABASE SIZES
- researchers: 242,000 researchers, 2.6M h-index history records
- patents: 2,400 patents, 24 portfolio companies
- grants: 392,000 grants, $222B total funding, 557K PIs
- policies: 28 bills tracked
- portfolio: 24 companies
- market_data: 89,000 clinical trials

## RAW SQL SCHEMA REFERENCE
researchers: researchers(id, name, orcid, h_index, i10_index, works_count, cited_by_count,
two_yr_citedness, slope, topics JSON, affiliations JSON, primary_category),
h_index_history(researcher_id, year, h_index)
patents: patents(id, patent_number, title, abstract, grant_date, filing_date, primary_assignee,
cpc_codes, claims_count), inventors(patent_id, name, sequence), cpc_classifications
grants: grants(id, title, abstract, agency, institute, mechanism, total_cost, fiscal_year,
organization, pi_name), principal_investigators, entity_links
policies: bills(id, title, summary, status), analyses(bill_id, analysis_text)
portfolio: companies(id, name, ticker, modality, competitive_advantage, indications, fund),
updates(company_id, title, content, published_at)
market_data: clinical_trials(id, nct_id, brief_title, status, phase, conditions JSON,
interventions JSON, sponsor, enrollment, start_date), fda_events(event_type, ticker, company,
drug, indication, event_date)

## SYNTHESIS GUIDELINES
1. Lead with the key insight, not raw numbers.
2. Explain what numbers mean (an h-index of 85 is top 0.1% globally).
3. Connect related findings across databases.
4. Highlight unusual patterns.
5. For cross-database questions, start with search_entity or get_company_profile.

## QUERY RULES
1. ALWAYS include id in SELECT for entity queries (enables clickable source links).
2. Use LIMIT 10-50 on all raw queries.
3. Only use raw SQL when no semantic function covers the question.

Be direct. Execute queries efficiently. Synthesize across databases.
Do NOT include a Sources section; source links are generated automatically from your query results.";

/// Per-run model parameters.
#[derive(Clone, Debug)]
pub struct AgentOptions {
    pub model: String,
    pub max_turns: u32,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// Result of driving the loop: the run itself plus whether it finished
/// cleanly (only clean completions are written to the response cache).
pub struct AgentOutcome {
    pub run: AgentRun,
    pub completed: bool,
}

fn emit(events: Option<&UnboundedSender<AgentEvent>>, event: AgentEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}

fn to_messages(history: &[ChatMessage], question: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = history
        .iter()
        .map(|msg| {
            if msg.role == "assistant" {
                Message::assistant_text(msg.content.clone())
            } else {
                Message::user_text(msg.content.clone())
            }
        })
        .collect();
    messages.push(Message::user_text(question));
    messages
}

/// Run the bounded tool-use loop for one question.
///
/// Each turn sends the system prompt, tool catalog, and running history to
/// the model; `tool_use` responses dispatch through the registry and feed a
/// synthetic user turn of `tool_result` blocks back, in the same order as
/// the `tool_use` blocks (the model matches them positionally by id).
pub async fn run_agent(
    llm: &dyn LlmCaller,
    registry: &ToolRegistry,
    options: &AgentOptions,
    question: &str,
    history: &[ChatMessage],
    events: Option<&UnboundedSender<AgentEvent>>,
) -> AgentOutcome {
    let definitions: Vec<ToolDefinition> = registry.definitions();
    let mut messages = to_messages(history, question);

    let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
    let mut turns_used = 0u32;
    let preview_chars = registry.context().limits.max_preview_chars;

    while turns_used < options.max_turns {
        // A streaming caller that went away cancels the run; nothing is
        // returned and nothing gets cached.
        if events.is_some_and(|sender| sender.is_closed()) {
            tracing::info!("Event channel closed, cancelling agent run");
            return AgentOutcome {
                run: AgentRun {
                    answer: String::new(),
                    tool_calls,
                    insights: registry.context().insights(),
                    entities: registry.context().entities(),
                    model: Some(options.model.clone()),
                    turns_used,
                    warning: None,
                    error: None,
                },
                completed: false,
            };
        }

        turns_used += 1;
        emit(
            events,
            AgentEvent::Status {
                message: format!("Thinking... (step {})", turns_used),
            },
        );

        let params = ChatParams {
            model: &options.model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: AGENT_SYSTEM_PROMPT,
        };

        let response = match llm.chat(params, &messages, &definitions).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "LLM API error during agent run");
                return AgentOutcome {
                    run: AgentRun {
                        answer: format!("API error: {}", e),
                        tool_calls,
                        insights: registry.context().insights(),
                        entities: registry.context().entities(),
                        model: Some(options.model.clone()),
                        turns_used,
                        warning: None,
                        error: Some(RunError::ApiError),
                    },
                    completed: false,
                };
            }
        };

        match response.stop_reason {
            StopReason::EndTurn => {
                let answer = response.concatenated_text();
                return AgentOutcome {
                    run: AgentRun {
                        answer,
                        tool_calls,
                        insights: registry.context().insights(),
                        entities: registry.context().entities(),
                        model: Some(options.model.clone()),
                        turns_used,
                        warning: None,
                        error: None,
                    },
                    completed: true,
                };
            }
            StopReason::ToolUse => {
                let mut tool_results = Vec::new();

                for (id, name, input) in response.tool_uses() {
                    emit(
                        events,
                        AgentEvent::Tool {
                            tool: name.clone(),
                            message: status_label(&name),
                        },
                    );

                    let execution = registry.execute(&name, input.clone()).await;

                    if let Ok(parsed) =
                        serde_json::from_str::<serde_json::Value>(&execution.content)
                    {
                        if let Some(rows) = parsed.get("rows").and_then(|r| r.as_array()) {
                            emit(
                                events,
                                AgentEvent::ToolResult {
                                    tool: name.clone(),
                                    rows: rows.len(),
                                },
                            );
                        }
                    }

                    tool_calls.push(ToolCallRecord {
                        tool: name,
                        input,
                        result_preview: ellipsize(&execution.content, preview_chars),
                    });

                    tool_results.push(ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: execution.content,
                        is_error: execution.is_error.then_some(true),
                    });
                }

                messages.push(Message {
                    role: Role::Assistant,
                    content: response.content,
                });
                messages.push(Message {
                    role: Role::User,
                    content: tool_results,
                });
            }
            ref other => {
                // Unexpected terminal condition; finalize with whatever text
                // is present but keep it out of the response cache.
                tracing::warn!(stop_reason = ?other, "Unexpected stop reason");
                let text = response.concatenated_text();
                let answer = if text.is_empty() {
                    format!("Unexpected stop reason: {:?}", other)
                } else {
                    text
                };
                return AgentOutcome {
                    run: AgentRun {
                        answer,
                        tool_calls,
                        insights: registry.context().insights(),
                        entities: registry.context().entities(),
                        model: Some(options.model.clone()),
                        turns_used,
                        warning: None,
                        error: None,
                    },
                    completed: false,
                };
            }
        }
    }

    AgentOutcome {
        run: AgentRun {
            answer: "I've reached the maximum number of analysis steps. Here's what I found \
                     so far based on my queries."
                .to_string(),
            tool_calls,
            insights: registry.context().insights(),
            entities: registry.context().entities(),
            model: Some(options.model.clone()),
            turns_used,
            warning: Some(RunWarning::MaxTurnsExceeded),
            error: None,
        },
        completed: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
