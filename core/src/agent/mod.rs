//! Agent loop
//!
//! A bounded Thought → Action → Observation loop over a prompt template and a
//! tool registry. The model's text is parsed with the transcript grammar
//! (`Thought:` / `Action:` / `Action Input:` / `Final Answer:`); every tool
//! result, failure included, is fed back as an observation.
//!
//! ```text
//!   ┌──────────┐   prompt + scratchpad   ┌──────────┐
//!   │ Executor │ ──────────────────────▶ │   LLM    │
//!   │          │ ◀────────────────────── │          │
//!   └────┬─────┘     Action / Final      └──────────┘
//!        │ tool, input
//!        ▼
//!   ┌──────────┐
//!   │  Tools   │ ── observation ──▶ trace
//!   └──────────┘
//! ```

mod executor;
mod parser;
mod trace;

pub use executor::{AgentExecutor, ExecutorConfig, ITERATION_LIMIT_MESSAGE};
pub use parser::{parse_agent_output, AgentOutput, OutputParseError};
pub use trace::{ExecutionTrace, Termination, TraceStep};
