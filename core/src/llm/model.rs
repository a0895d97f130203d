use async_trait::async_trait;

use crate::context::PromptBundle;
use crate::Result;

use super::client::LlmClient;

/// A text completion service: the delegate every agent stage talks to.
///
/// `stop` lists sequences at which generation must end; implementations that
/// cannot pass them to the backend must cut the returned text at the first
/// occurrence themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String>;
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let bundle = PromptBundle::from_prompt(prompt).with_stop(stop);
        let response = self.generate(&bundle, None).await?;
        Ok(truncate_at_stop(&response.text, stop).to_string())
    }
}

/// Cut `text` at the earliest stop sequence, if any occurs.
pub(crate) fn truncate_at_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}
