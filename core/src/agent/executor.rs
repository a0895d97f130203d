use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::tools::{ToolError, ToolRegistry};
use crate::{Result, TrellisError};

use super::parser::{parse_agent_output, thought_of, AgentOutput};
use super::trace::{ExecutionTrace, Termination, TraceStep};

/// Answer returned when the loop runs out of turns or time
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// Action name recorded for turns that produced no usable action
const EXCEPTION_ACTION: &str = "_Exception";

/// Configuration for an agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum number of model turns
    pub max_iterations: usize,

    /// Wall-clock budget for the whole run
    pub max_execution_time: Option<Duration>,

    /// A final answer is rejected until this tool has been called
    pub required_tool: Option<String>,

    /// Stop sequences passed to the model
    pub stop: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_execution_time: None,
            required_tool: None,
            stop: vec!["\nObservation:".to_string(), "\n\tObservation:".to_string()],
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    pub fn requiring_tool(mut self, tool: impl Into<String>) -> Self {
        self.required_tool = Some(tool.into());
        self
    }
}

/// Drives the Thought/Action/Observation loop for one prompt and tool set.
pub struct AgentExecutor {
    name: String,
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
    tools: ToolRegistry,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// `prompt` must take `input` and `agent_scratchpad`; `tool_names` and
    /// `tool_descriptions` are filled from the registry when the prompt uses them.
    pub fn new(
        name: impl Into<String>,
        llm: Arc<dyn LanguageModel>,
        prompt: PromptTemplate,
        tools: ToolRegistry,
        config: ExecutorConfig,
    ) -> Result<Self> {
        for required in ["input", "agent_scratchpad"] {
            if !prompt.input_variables.iter().any(|v| v == required) {
                return Err(TrellisError::PromptError(format!(
                    "agent prompt must take '{required}'"
                )));
            }
        }
        let mut prompt = prompt;
        if prompt.input_variables.iter().any(|v| v == "tool_names") {
            prompt = prompt.partial("tool_names", tools.names().join(", "));
        }
        if prompt.input_variables.iter().any(|v| v == "tool_descriptions") {
            prompt = prompt.partial("tool_descriptions", tools.descriptions());
        }
        Ok(Self {
            name: name.into(),
            llm,
            prompt,
            tools,
            config,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn run(&self, input: &str) -> Result<ExecutionTrace> {
        self.resume(ExecutionTrace::new(input)).await
    }

    /// Continue a trace that may already carry confirmations or steps
    pub async fn resume(&self, mut trace: ExecutionTrace) -> Result<ExecutionTrace> {
        let started = Instant::now();
        info!(target: "agent.executor", agent = %self.name, "Starting agent run");

        for iteration in 0..self.config.max_iterations {
            if let Some(limit) = self.config.max_execution_time {
                if started.elapsed() >= limit {
                    warn!(target: "agent.executor", agent = %self.name, "Time limit reached");
                    break;
                }
            }

            let scratchpad = trace.scratchpad();
            let prompt = self.prompt.format(&[
                ("input", trace.input.as_str()),
                ("agent_scratchpad", scratchpad.as_str()),
            ])?;
            let raw = self.llm.complete(&prompt, &self.config.stop).await?;
            let text = crate::llm::truncate_at_stop(&raw, &self.config.stop).trim_end();

            debug!(target: "agent.executor", agent = %self.name, iteration, "Model turn");

            match parse_agent_output(text) {
                Ok(AgentOutput::Finish { answer, log }) => {
                    let thought = thought_of(&log);
                    if let Some(required) = &self.config.required_tool {
                        if !trace.invoked(required) {
                            debug!(target: "agent.executor", agent = %self.name, tool = %required, "Final answer rejected; required tool not yet used");
                            trace.push(TraceStep {
                                thought,
                                action: EXCEPTION_ACTION.to_string(),
                                action_input: answer,
                                observation: format!(
                                    "You must execute the {required} tool before giving a final answer."
                                ),
                                log,
                            });
                            continue;
                        }
                    }
                    info!(target: "agent.executor", agent = %self.name, steps = trace.steps.len(), "Agent finished");
                    trace.finish(Termination::classify(&thought, answer));
                    return Ok(trace);
                }
                Ok(AgentOutput::Action { tool, input, log }) => {
                    let observation = match self.tools.call(&tool, &input).await {
                        Ok(output) => output,
                        Err(ToolError::NotFound(_)) => format!(
                            "{tool} is not a valid tool, try one of [{}].",
                            self.tools.names().join(", ")
                        ),
                        Err(e) => format!("Error: {e}"),
                    };
                    trace.push(TraceStep {
                        thought: thought_of(&log),
                        action: tool,
                        action_input: input,
                        observation,
                        log,
                    });
                }
                Err(e) => {
                    warn!(target: "agent.executor", agent = %self.name, error = %e, "Unparseable model output");
                    trace.push(TraceStep {
                        thought: thought_of(text),
                        action: EXCEPTION_ACTION.to_string(),
                        action_input: String::new(),
                        observation: e.to_string(),
                        log: text.to_string(),
                    });
                }
            }
        }

        warn!(target: "agent.executor", agent = %self.name, steps = trace.steps.len(), "Agent stopped before a final answer");
        trace.finish(Termination::IterationLimit(ITERATION_LIMIT_MESSAGE.to_string()));
        Ok(trace)
    }
}
