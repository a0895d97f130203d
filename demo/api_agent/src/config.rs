use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use trellis_core::{
    ControllerConfig, ExecutorConfig, LlmClientConfig, Method, OrchestratorConfig,
};

/// High-level configuration for the API agent
#[derive(Clone, Debug, Default)]
pub struct ApiAgentConfig {
    pub llm: LlmClientConfig,
    pub api: ApiConfig,
    pub agent: AgentConfig,
}

/// The target API
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// OpenAPI document, JSON or YAML
    pub spec_path: PathBuf,
    /// Sent with every API request, e.g. authorization
    pub headers: Vec<(String, String)>,
    pub request_timeout_ms: u64,
}

/// Loop limits and behavior of the planner/controller/orchestrator stages
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub allowed_operations: Vec<Method>,
    pub max_iterations: usize,
    pub controller_max_iterations: usize,
    pub max_execution_secs: Option<u64>,
    /// One api_planner/api_controller call; derived from the controller limits when unset
    pub delegate_timeout_secs: Option<u64>,
    pub summarize: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut headers = Vec::new();
        if let Some(token) = std::env::var("API_AUTH_TOKEN").ok().filter(|s| !s.is_empty()) {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        Self {
            spec_path: std::env::var("API_SPEC_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("openapi.yaml")),
            headers,
            request_timeout_ms: std::env::var("API_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            allowed_operations: vec![Method::Get, Method::Post, Method::Patch, Method::Delete],
            max_iterations: 15,
            controller_max_iterations: 15,
            max_execution_secs: None,
            delegate_timeout_secs: None,
            summarize: false,
        }
    }
}

impl ApiAgentConfig {
    /// Load configuration from a TOML file (path via API_AGENT_CONFIG or ./api_agent.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("API_AGENT_CONFIG").unwrap_or_else(|_| "api_agent.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target: "api_agent", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<ApiAgentToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "api_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "api_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut executor = ExecutorConfig::default().with_max_iterations(self.agent.max_iterations);
        let mut controller_executor =
            ExecutorConfig::default().with_max_iterations(self.agent.controller_max_iterations);
        if let Some(secs) = self.agent.max_execution_secs {
            executor = executor.with_max_execution_time(Duration::from_secs(secs));
            controller_executor =
                controller_executor.with_max_execution_time(Duration::from_secs(secs));
        }
        OrchestratorConfig {
            executor,
            controller: ControllerConfig {
                allowed_operations: self.agent.allowed_operations.clone(),
                executor: controller_executor,
                tool_timeout: self.request_timeout() * 2,
            },
            summarize: self.agent.summarize,
            delegate_timeout: self.agent.delegate_timeout_secs.map(Duration::from_secs),
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ApiAgentToml {
    pub llm: Option<LlmToml>,
    pub api: Option<ApiToml>,
    pub agent: Option<AgentToml>,
}

impl ApiAgentToml {
    fn overlay(self, mut base: ApiAgentConfig) -> ApiAgentConfig {
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        if let Some(a) = self.api {
            a.apply(&mut base.api);
        }
        if let Some(a) = self.agent {
            a.apply(&mut base.agent);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(x) = self.base_url {
            l.base_url = x;
        }
        if let Some(x) = self.model {
            l.model = x;
        }
        if let Some(x) = self.api_key.filter(|k| !k.is_empty()) {
            l.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            l.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            l.temperature = x.clamp(0.0, 2.0);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ApiToml {
    pub spec_path: Option<PathBuf>,
    pub headers: Option<std::collections::BTreeMap<String, String>>,
    pub request_timeout_ms: Option<u64>,
}
impl ApiToml {
    fn apply(self, a: &mut ApiConfig) {
        if let Some(x) = self.spec_path {
            a.spec_path = x;
        }
        if let Some(headers) = self.headers {
            for (name, value) in headers {
                a.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
                a.headers.push((name, value));
            }
        }
        if let Some(x) = self.request_timeout_ms {
            a.request_timeout_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AgentToml {
    pub allowed_operations: Option<Vec<Method>>,
    pub max_iterations: Option<usize>,
    pub controller_max_iterations: Option<usize>,
    pub max_execution_secs: Option<u64>,
    pub delegate_timeout_secs: Option<u64>,
    pub summarize: Option<bool>,
}
impl AgentToml {
    fn apply(self, a: &mut AgentConfig) {
        if let Some(x) = self.allowed_operations {
            a.allowed_operations = x;
        }
        if let Some(x) = self.max_iterations {
            a.max_iterations = x.max(1);
        }
        if let Some(x) = self.controller_max_iterations {
            a.controller_max_iterations = x.max(1);
        }
        if let Some(x) = self.max_execution_secs {
            a.max_execution_secs = Some(x);
        }
        if let Some(x) = self.delegate_timeout_secs {
            a.delegate_timeout_secs = Some(x.max(1));
        }
        if let Some(x) = self.summarize {
            a.summarize = x;
        }
    }
}
