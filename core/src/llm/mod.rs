//! LLM module: the language-model seam, the HTTP client, and the prompt adapter
//!
//! This module provides:
//! - `LanguageModel`, the completion trait every agent stage depends on
//! - `LlmClientConfig`, `LlmClient`, `LlmResponse` for talking to OpenAI-compatible backends
//! - `promptbundle_to_messages_and_text` adapter for turning `PromptBundle` into payloads

mod adapter;
mod client;
mod model;

pub use adapter::promptbundle_to_messages_and_text;
pub use client::{LlmClient, LlmClientConfig, LlmResponse};
pub use model::LanguageModel;
pub(crate) use model::truncate_at_stop;

#[cfg(test)]
pub use model::MockLanguageModel;
