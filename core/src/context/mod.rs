//! Prompt assembly types shared by the LLM client and the agents.

use serde::{Deserialize, Serialize};

/// Token budget to control prompt assembly size
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_input_tokens: 16_384,
            max_output_tokens: 1024,
        }
    }
}

/// A bundle of prompt components for an LLM call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptBundle {
    pub system: String,
    pub instructions: String,
    pub context_docs: Vec<String>,
    pub history: Vec<String>,
    /// Sequences at which the model should stop generating
    pub stop: Vec<String>,
}

impl PromptBundle {
    /// A bundle carrying a single rendered prompt as the user instruction
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            instructions: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_stop(mut self, stop: &[String]) -> Self {
        self.stop = stop.to_vec();
        self
    }
}
