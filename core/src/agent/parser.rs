//! Parser for the Thought/Action/Action Input/Final Answer transcript grammar.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::tools::parse_json_markdown;

/// What the model decided to do this turn
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Action {
        tool: String,
        input: String,
        /// Full model text for the scratchpad
        log: String,
    },
    Finish {
        answer: String,
        log: String,
    },
}

impl AgentOutput {
    pub fn log(&self) -> &str {
        match self {
            AgentOutput::Action { log, .. } | AgentOutput::Finish { log, .. } => log,
        }
    }
}

/// The texts double as observations, so they are written to the model
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OutputParseError {
    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,

    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,

    #[error("Parsing LLM output produced both a final answer and a parse-able action: {0}")]
    FinalAnswerAndAction(String),
}

fn final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)final\s+answer\s*:\s*(.*)$").expect("static regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("static regex")
    })
}

fn action_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Action\s*\d*\s*:").expect("static regex"))
}

fn clean_tool_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| "[]`\"'".contains(c))
        .trim()
        .to_string()
}

fn clean_tool_input(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(' ');
    // A quoted scalar loses its quotes; a JSON object keeps its own
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse one model turn.
///
/// Accepts the plain grammar and, as a fallback, a fenced JSON blob
/// `{"action": ..., "action_input": ...}` where the action `Final Answer`
/// finishes the run.
pub fn parse_agent_output(text: &str) -> Result<AgentOutput, OutputParseError> {
    let log = text.to_string();
    let final_answer = final_answer_re().captures(text);
    let action = action_re().captures(text);

    match (action, final_answer) {
        (Some(action), Some(answer)) => {
            // Only an answer that precedes the action is a real conflict; one the
            // model hallucinated after its action input is ignored
            let action_at = action.get(0).map(|m| m.start()).unwrap_or(0);
            let answer_at = answer.get(0).map(|m| m.start()).unwrap_or(0);
            if answer_at < action_at {
                return Err(OutputParseError::FinalAnswerAndAction(text.trim().to_string()));
            }
            let input = &action[2][..answer_at.saturating_sub(action.get(2).map(|m| m.start()).unwrap_or(0))];
            Ok(AgentOutput::Action {
                tool: clean_tool_name(&action[1]),
                input: clean_tool_input(input),
                log,
            })
        }
        (Some(action), None) => Ok(AgentOutput::Action {
            tool: clean_tool_name(&action[1]),
            input: clean_tool_input(&action[2]),
            log,
        }),
        (None, Some(answer)) => Ok(AgentOutput::Finish {
            answer: answer[1].trim().to_string(),
            log,
        }),
        (None, None) => {
            if let Some(blob) = parse_json_blob(text) {
                return Ok(blob);
            }
            if action_only_re().is_match(text) {
                Err(OutputParseError::MissingActionInput)
            } else {
                Err(OutputParseError::MissingAction)
            }
        }
    }
}

fn parse_json_blob(text: &str) -> Option<AgentOutput> {
    if !text.contains("```") {
        return None;
    }
    let value = parse_json_markdown(text).ok()?;
    let tool = value.get("action")?.as_str()?.trim().to_string();
    let input = match value.get("action_input") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let log = text.to_string();
    if tool.eq_ignore_ascii_case("final answer") {
        Some(AgentOutput::Finish { answer: input, log })
    } else {
        Some(AgentOutput::Action { tool, input, log })
    }
}

/// The reasoning text of a turn: whatever precedes `Action:` or `Final Answer:`
pub(crate) fn thought_of(log: &str) -> String {
    let cut = [action_only_re().find(log), final_answer_re().find(log)]
        .into_iter()
        .flatten()
        .map(|m| m.start())
        .min()
        .unwrap_or(log.len());
    let thought = log[..cut].trim();
    thought
        .strip_prefix("Thought:")
        .unwrap_or(thought)
        .trim()
        .to_string()
}
