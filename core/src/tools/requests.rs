//! HTTP request tools for the controller.
//!
//! Each tool takes a JSON object (optionally wrapped in a ```json fence) naming
//! the `url`, the request `params` or `data`, and `output_instructions`. The raw
//! response is truncated and handed to an extraction prompt, so the controller
//! only ever sees extracted ids/values or a summary of the error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::LanguageModel;
use crate::prompt::templates::{
    PARSING_DELETE_PROMPT, PARSING_GET_PROMPT, PARSING_PATCH_PROMPT, PARSING_POST_PROMPT,
    REQUESTS_DELETE_TOOL_DESCRIPTION, REQUESTS_GET_TOOL_DESCRIPTION,
    REQUESTS_PATCH_TOOL_DESCRIPTION, REQUESTS_POST_TOOL_DESCRIPTION,
};
use crate::prompt::PromptTemplate;
use crate::{Result, TrellisError};

use super::authorization::DeleteAuthorization;
use super::error::{ToolError, ToolResult};
use super::traits::Tool;
use super::Method;

/// Raw responses are cut to this many characters before extraction
pub const MAX_RESPONSE_LENGTH: usize = 5000;

/// Thin HTTP client with default headers and an optional base URL for relative paths
#[derive(Clone)]
pub struct RequestsWrapper {
    http: reqwest::Client,
    base_url: Option<Url>,
}

impl RequestsWrapper {
    pub fn new(headers: &[(String, String)], timeout: Duration) -> Result<Self> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TrellisError::ConfigError(format!("bad header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TrellisError::ConfigError(format!("bad header value: {e}")))?;
            map.insert(name, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(map)
            .timeout(timeout)
            .user_agent("trellis-agent/0.1")
            .build()
            .map_err(|e| TrellisError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: None,
        })
    }

    /// Resolve relative tool URLs (`/user`) against `base_url`
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let url = Url::parse(&base)
            .map_err(|e| TrellisError::ConfigError(format!("bad base url {base_url}: {e}")))?;
        self.base_url = Some(url);
        Ok(self)
    }

    fn resolve(&self, url: &str) -> ToolResult<Url> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| ToolError::InvalidArguments(format!("relative url without base: {url}")))?;
        base.join(url.trim_start_matches('/'))
            .map_err(|e| ToolError::InvalidArguments(format!("bad url {url}: {e}")))
    }

    pub async fn get(&self, url: &str, params: Option<&Value>) -> ToolResult<String> {
        let mut req = self.http.get(self.resolve(url)?);
        match params {
            None | Some(Value::Null) => {}
            Some(Value::Object(params)) => {
                let pairs: Vec<(String, String)> = params
                    .iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect();
                req = req.query(&pairs);
            }
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "params must be a JSON object of query parameters, got {other}"
                )));
            }
        }
        Self::send(Method::Get, url, req).await
    }

    pub async fn post(&self, url: &str, data: &Value) -> ToolResult<String> {
        let req = self.http.post(self.resolve(url)?).json(data);
        Self::send(Method::Post, url, req).await
    }

    pub async fn patch(&self, url: &str, data: &Value) -> ToolResult<String> {
        let req = self.http.patch(self.resolve(url)?).json(data);
        Self::send(Method::Patch, url, req).await
    }

    pub async fn delete(&self, url: &str) -> ToolResult<String> {
        let req = self.http.delete(self.resolve(url)?);
        Self::send(Method::Delete, url, req).await
    }

    /// Response body as text; non-2xx statuses are prefixed so the extractor can
    /// recognise the error.
    async fn send(method: Method, url: &str, req: RequestBuilder) -> ToolResult<String> {
        debug!(target: "requests", %method, url = %url, "Sending request");
        let resp = req
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{method} {url} failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("reading {method} {url} body: {e}")))?;
        if status.is_success() {
            Ok(body)
        } else {
            warn!(target: "requests", %method, url = %url, %status, "Request returned an error status");
            Ok(format!("HTTP {status}\n{body}"))
        }
    }
}

/// Parse a JSON object that may be wrapped in a Markdown code fence
pub fn parse_json_markdown(text: &str) -> ToolResult<Value> {
    let trimmed = text.trim();
    let inner = match trimmed.find("```") {
        Some(start) => {
            let after = &trimmed[start + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => trimmed,
    };
    serde_json::from_str(inner.trim())
        .map_err(|e| ToolError::InvalidArguments(format!("tool input is not valid JSON: {e}")))
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Runs a raw response through the extraction prompt
#[derive(Clone)]
struct Extractor {
    llm: Arc<dyn LanguageModel>,
    prompt: &'static str,
    response_length: usize,
}

impl Extractor {
    async fn extract(&self, response: &str, instructions: &str) -> ToolResult<String> {
        let response = truncate_chars(response, self.response_length);
        let prompt = PromptTemplate::new(self.prompt, &["response", "instructions"])
            .format(&[("response", response), ("instructions", instructions)])
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let output = self
            .llm
            .complete(&prompt, &[])
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("extraction failed: {e}")))?;
        Ok(output.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GetInput {
    url: String,
    #[serde(default)]
    params: Option<Value>,
    output_instructions: String,
}

#[derive(Debug, Deserialize)]
struct DataInput {
    url: String,
    #[serde(default)]
    data: Value,
    output_instructions: String,
}

#[derive(Debug, Deserialize)]
struct DeleteInput {
    url: String,
    output_instructions: String,
}

fn parse_input<T: for<'de> Deserialize<'de>>(text: &str) -> ToolResult<T> {
    let value = parse_json_markdown(text)?;
    serde_json::from_value(value).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub struct RequestsGetTool {
    requests: RequestsWrapper,
    extractor: Extractor,
}

impl RequestsGetTool {
    pub fn new(requests: RequestsWrapper, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            requests,
            extractor: Extractor {
                llm,
                prompt: PARSING_GET_PROMPT,
                response_length: MAX_RESPONSE_LENGTH,
            },
        }
    }
}

#[async_trait]
impl Tool for RequestsGetTool {
    fn name(&self) -> String {
        "requests_get".into()
    }

    fn description(&self) -> String {
        REQUESTS_GET_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        let input: GetInput = parse_input(input)?;
        let response = self.requests.get(&input.url, input.params.as_ref()).await?;
        self.extractor
            .extract(&response, &input.output_instructions)
            .await
    }
}

pub struct RequestsPostTool {
    requests: RequestsWrapper,
    extractor: Extractor,
}

impl RequestsPostTool {
    pub fn new(requests: RequestsWrapper, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            requests,
            extractor: Extractor {
                llm,
                prompt: PARSING_POST_PROMPT,
                response_length: MAX_RESPONSE_LENGTH,
            },
        }
    }
}

#[async_trait]
impl Tool for RequestsPostTool {
    fn name(&self) -> String {
        "requests_post".into()
    }

    fn description(&self) -> String {
        REQUESTS_POST_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        let input: DataInput = parse_input(input)?;
        let response = self.requests.post(&input.url, &input.data).await?;
        self.extractor
            .extract(&response, &input.output_instructions)
            .await
    }
}

pub struct RequestsPatchTool {
    requests: RequestsWrapper,
    extractor: Extractor,
}

impl RequestsPatchTool {
    pub fn new(requests: RequestsWrapper, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            requests,
            extractor: Extractor {
                llm,
                prompt: PARSING_PATCH_PROMPT,
                response_length: MAX_RESPONSE_LENGTH,
            },
        }
    }
}

#[async_trait]
impl Tool for RequestsPatchTool {
    fn name(&self) -> String {
        "requests_patch".into()
    }

    fn description(&self) -> String {
        REQUESTS_PATCH_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        let input: DataInput = parse_input(input)?;
        let response = self.requests.patch(&input.url, &input.data).await?;
        self.extractor
            .extract(&response, &input.output_instructions)
            .await
    }
}

/// DELETE tool; refuses to send anything the user has not authorized.
pub struct RequestsDeleteTool {
    requests: RequestsWrapper,
    extractor: Extractor,
    authorization: Arc<DeleteAuthorization>,
}

impl RequestsDeleteTool {
    pub fn new(
        requests: RequestsWrapper,
        llm: Arc<dyn LanguageModel>,
        authorization: Arc<DeleteAuthorization>,
    ) -> Self {
        Self {
            requests,
            extractor: Extractor {
                llm,
                prompt: PARSING_DELETE_PROMPT,
                response_length: MAX_RESPONSE_LENGTH,
            },
            authorization,
        }
    }
}

#[async_trait]
impl Tool for RequestsDeleteTool {
    fn name(&self) -> String {
        "requests_delete".into()
    }

    fn description(&self) -> String {
        REQUESTS_DELETE_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        let input: DeleteInput = parse_input(input)?;
        if !self.authorization.allows_delete() {
            warn!(target: "requests", url = %input.url, "DELETE blocked: no user authorization");
            return Err(ToolError::PermissionDenied(format!(
                "DELETE {} was not sent. The user did not ask for deletion and has not authorized it; ask the user for authorization first.",
                input.url
            )));
        }
        let response = self.requests.delete(&input.url).await?;
        self.extractor
            .extract(&response, &input.output_instructions)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let v = parse_json_markdown("```json\n{\"url\": \"/user\", \"params\": {}}\n```").unwrap();
        assert_eq!(v["url"], "/user");
        let v = parse_json_markdown("  {\"url\": \"/x\"} ").unwrap();
        assert_eq!(v["url"], "/x");
        assert!(parse_json_markdown("not json").is_err());
    }

    #[test]
    fn resolves_relative_urls_against_base() {
        let requests = RequestsWrapper::new(&[], Duration::from_secs(1))
            .unwrap()
            .with_base_url("https://api.example.com/v1")
            .unwrap();
        assert_eq!(
            requests.resolve("/users/3/cart").unwrap().as_str(),
            "https://api.example.com/v1/users/3/cart"
        );
        assert_eq!(
            requests.resolve("https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn relative_url_without_base_is_rejected() {
        let requests = RequestsWrapper::new(&[], Duration::from_secs(1)).unwrap();
        assert!(matches!(
            requests.resolve("/user"),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn input_contract_requires_instructions() {
        assert!(parse_input::<GetInput>(r#"{"url": "/user", "params": {}}"#).is_err());
        let ok: GetInput = parse_input(
            r#"{"url": "/user", "params": {}, "output_instructions": "return the user id"}"#,
        )
        .unwrap();
        assert_eq!(ok.output_instructions, "return the user id");
    }
}
