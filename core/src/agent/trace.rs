//! Execution trace of one agent run.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One Thought/Action/Action Input/Observation tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
    /// Raw model text of the turn, replayed in the scratchpad
    pub log: String,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    FinalAnswer(String),
    /// The model finished but reported it could not complete the plan
    MissingInformation(String),
    IterationLimit(String),
}

impl Termination {
    pub fn text(&self) -> &str {
        match self {
            Termination::FinalAnswer(t)
            | Termination::MissingInformation(t)
            | Termination::IterationLimit(t) => t,
        }
    }

    /// Classify a final answer by the thought that led to it
    pub fn classify(thought: &str, answer: impl Into<String>) -> Self {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?i)\b(cannot|can't|can not|unable to)\s+(finish|complete)")
                .expect("static regex")
        });
        let answer = answer.into();
        if re.is_match(thought) {
            Termination::MissingInformation(answer)
        } else {
            Termination::FinalAnswer(answer)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub input: String,
    /// Confirmations the user gave before or during the run
    pub confirmations: Vec<String>,
    pub steps: Vec<TraceStep>,
    pub termination: Option<Termination>,
}

impl ExecutionTrace {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn record_confirmation(&mut self, note: impl Into<String>) {
        self.confirmations.push(note.into());
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    pub fn finish(&mut self, termination: Termination) {
        self.termination = Some(termination);
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// The terminal text, if the run finished
    pub fn answer(&self) -> Option<&str> {
        self.termination.as_ref().map(Termination::text)
    }

    /// Whether `tool` was called at least once
    pub fn invoked(&self, tool: &str) -> bool {
        self.steps.iter().any(|s| s.action == tool)
    }

    /// Previous turns, each followed by its observation and a fresh `Thought:`
    pub fn scratchpad(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.log);
            out.push_str("\nObservation: ");
            out.push_str(&step.observation);
            out.push_str("\nThought: ");
        }
        out
    }

    /// Observations of the given tool, in order
    pub fn observations_of(&self, tool: &str) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action == tool)
            .map(|s| s.observation.as_str())
            .collect()
    }
}
