//! Controller: executes a plan against the API with the request tools.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::{AgentExecutor, ExecutionTrace, ExecutorConfig};
use crate::catalog::OperationCatalog;
use crate::llm::LanguageModel;
use crate::prompt::templates::API_CONTROLLER_PROMPT;
use crate::prompt::PromptTemplate;
use crate::tools::{
    DeleteAuthorization, Method, RequestsDeleteTool, RequestsGetTool, RequestsPatchTool,
    RequestsPostTool, RequestsWrapper, ToolRegistry,
};
use crate::Result;

/// Configuration for the controller loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Request tools exposed to the model
    pub allowed_operations: Vec<Method>,

    pub executor: ExecutorConfig,

    /// Per tool call, HTTP round trip plus extraction
    pub tool_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            allowed_operations: vec![Method::Get, Method::Post, Method::Patch, Method::Delete],
            executor: ExecutorConfig::default(),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ApiController {
    llm: Arc<dyn LanguageModel>,
    catalog: Arc<OperationCatalog>,
    requests: RequestsWrapper,
    config: ControllerConfig,
}

impl ApiController {
    /// Relative tool URLs resolve against the catalog's base URL
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        catalog: Arc<OperationCatalog>,
        requests: RequestsWrapper,
        config: ControllerConfig,
    ) -> Result<Self> {
        let requests = if catalog.base_url.is_empty() {
            requests
        } else {
            requests.with_base_url(&catalog.base_url)?
        };
        Ok(Self {
            llm,
            catalog,
            requests,
            config,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run the plan to a final answer, a missing-information report or the
    /// iteration limit.
    ///
    /// Fails with a catalog error when the plan names an endpoint the catalog
    /// does not have.
    pub async fn execute(
        &self,
        plan: &str,
        authorization: Arc<DeleteAuthorization>,
    ) -> Result<ExecutionTrace> {
        let docs = self.catalog.docs_for_plan(plan).map_err(|e| {
            warn!(target: "controller", error = %e, "Plan references unknown endpoint");
            e
        })?;

        let prompt = PromptTemplate::from_template(API_CONTROLLER_PROMPT)?
            .partial("api_url", self.catalog.base_url.clone())
            .partial("api_docs", docs);
        let executor = AgentExecutor::new(
            "controller",
            self.llm.clone(),
            prompt,
            self.tools(authorization.clone()),
            self.config.executor.clone(),
        )?;

        let mut trace = ExecutionTrace::new(plan);
        if authorization.confirmed() {
            trace.record_confirmation("User authorized DELETE operations.");
        }

        info!(target: "controller", "Executing plan");
        let trace = executor.resume(trace).await?;
        info!(
            target: "controller",
            steps = trace.steps.len(),
            termination = ?trace.termination,
            "Plan execution ended"
        );
        Ok(trace)
    }

    fn tools(&self, authorization: Arc<DeleteAuthorization>) -> ToolRegistry {
        let registry = ToolRegistry::with_timeout(self.config.tool_timeout);
        for method in &self.config.allowed_operations {
            let requests = self.requests.clone();
            let llm = self.llm.clone();
            match method {
                Method::Get => registry.register(Arc::new(RequestsGetTool::new(requests, llm))),
                Method::Post => registry.register(Arc::new(RequestsPostTool::new(requests, llm))),
                Method::Patch => {
                    registry.register(Arc::new(RequestsPatchTool::new(requests, llm)))
                }
                Method::Delete => registry.register(Arc::new(RequestsDeleteTool::new(
                    requests,
                    llm,
                    authorization.clone(),
                ))),
                Method::Put => {
                    warn!(target: "controller", "PUT has no request tool; skipping");
                }
            }
        }
        registry
    }
}
