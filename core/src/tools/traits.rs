use super::error::ToolResult;
use async_trait::async_trait;

/// A named capability the agent loop can invoke.
///
/// Input is the raw `Action Input` text the model produced; output is the
/// observation text fed back to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "requests_get")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does and its input contract
    fn description(&self) -> String;

    /// Execute the tool with the given input
    async fn call(&self, input: &str) -> ToolResult<String>;
}
