//! Response generation: rewrites controller results into a reply for the user.

use std::sync::Arc;

use tracing::debug;

use crate::agent::ExecutionTrace;
use crate::llm::LanguageModel;
use crate::prompt::templates::RESPONSE_GENERATION_PROMPT;
use crate::prompt::PromptTemplate;
use crate::Result;

pub struct ResponseGenerator {
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Result<Self> {
        Ok(Self {
            llm,
            prompt: PromptTemplate::from_template(RESPONSE_GENERATION_PROMPT)?,
        })
    }

    pub async fn generate(&self, task_execution: &str) -> Result<String> {
        let prompt = self.prompt.format(&[("task_execution", task_execution)])?;
        let reply = self.llm.complete(&prompt, &[]).await?;
        debug!(target: "orchestrator", chars = reply.len(), "Generated response");
        Ok(reply.trim().to_string())
    }

    pub async fn summarize(&self, traces: &[ExecutionTrace]) -> Result<String> {
        self.generate(&task_execution(traces)).await
    }
}

/// One block per controller run: the plan it executed and how it ended
pub fn task_execution(traces: &[ExecutionTrace]) -> String {
    traces
        .iter()
        .enumerate()
        .map(|(i, trace)| {
            format!(
                "Task {}:\nPlan: {}\nResult: {}",
                i + 1,
                trace.input.trim(),
                trace.answer().unwrap_or("(not finished)")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
