//! Orchestrator: plans, then executes, a user request through the planner and
//! controller tools.
//!
//! Every run owns its authorization, tools and phase tracker; an
//! `ApiOrchestrator` can serve independent requests concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::agent::{AgentExecutor, ExecutionTrace, ExecutorConfig, Termination, ITERATION_LIMIT_MESSAGE};
use crate::catalog::OperationCatalog;
use crate::controller::{ApiController, ControllerConfig};
use crate::llm::LanguageModel;
use crate::planner::{ApiPlanner, Plan};
use crate::prompt::templates::{
    API_CONTROLLER_TOOL_DESCRIPTION, API_CONTROLLER_TOOL_NAME, API_ORCHESTRATOR_PROMPT,
    API_PLANNER_TOOL_DESCRIPTION, API_PLANNER_TOOL_NAME,
};
use crate::prompt::PromptTemplate;
use crate::summarize::ResponseGenerator;
use crate::tools::{DeleteAuthorization, RequestsWrapper, Tool, ToolError, ToolRegistry, ToolResult};
use crate::{Result, TrellisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Planning,
    Executing,
    Replanning,
    Done,
    Failed,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Planning)
                | (Planning, Executing)
                | (Executing, Replanning)
                | (Executing, Done)
                | (Replanning, Executing)
                | (Replanning, Done)
                | (Idle | Planning | Executing | Replanning, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// A user request and whether the user has already confirmed deletion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRequest {
    pub text: String,
    #[serde(default)]
    pub confirmed_deletion: bool,
}

impl UserRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confirmed_deletion: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed_deletion = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub executor: ExecutorConfig,
    pub controller: ControllerConfig,

    /// Rewrite the answer from the controller results with the response prompt
    pub summarize: bool,

    /// Per delegate tool call; derived from the controller limits when unset
    #[serde(default)]
    pub delegate_timeout: Option<Duration>,
}

/// Allowance for one controller model turn on top of its tool timeout
const MODEL_TURN_ALLOWANCE: Duration = Duration::from_secs(60);

impl OrchestratorConfig {
    /// Long enough for a whole controller loop, so the controller stops on its
    /// own limits and its trace is kept.
    pub fn delegate_timeout(&self) -> Duration {
        if let Some(timeout) = self.delegate_timeout {
            return timeout;
        }
        let turn = self.controller.tool_timeout + MODEL_TURN_ALLOWANCE;
        match self.controller.executor.max_execution_time {
            Some(limit) => limit + turn,
            None => {
                let turns =
                    u32::try_from(self.controller.executor.max_iterations).unwrap_or(u32::MAX);
                turn.saturating_mul(turns)
            }
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            controller: ControllerConfig::default(),
            summarize: false,
            delegate_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorOutcome {
    pub answer: String,
    pub phase: Phase,
    pub phase_history: Vec<Phase>,
    pub trace: ExecutionTrace,
    pub controller_traces: Vec<ExecutionTrace>,
    pub plan: Option<Plan>,
    /// The last plan holds a DELETE step the user has not authorized
    pub needs_confirmation: bool,
}

/// Per-run record shared by the delegate tools
#[derive(Debug)]
struct RunState {
    phase: Phase,
    history: Vec<Phase>,
    plans: Vec<Plan>,
    controller_traces: Vec<ExecutionTrace>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            history: vec![Phase::Idle],
            plans: Vec::new(),
            controller_traces: Vec::new(),
        }
    }
}

impl RunState {
    fn advance(&mut self, next: Phase) -> bool {
        if next == self.phase {
            return true;
        }
        if !self.phase.can_transition_to(next) {
            warn!(target: "orchestrator", from = ?self.phase, to = ?next, "Illegal phase transition");
            return false;
        }
        debug!(target: "orchestrator", from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        self.history.push(next);
        true
    }
}

/// `api_planner`: produces a plan for the orchestrator loop
pub struct PlannerTool {
    planner: Arc<ApiPlanner>,
    authorization: Arc<DeleteAuthorization>,
    run: Arc<Mutex<RunState>>,
}

#[async_trait]
impl Tool for PlannerTool {
    fn name(&self) -> String {
        API_PLANNER_TOOL_NAME.into()
    }

    fn description(&self) -> String {
        API_PLANNER_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        {
            let mut run = self.run.lock().await;
            let next = match run.phase {
                Phase::Idle => Phase::Planning,
                Phase::Executing => Phase::Replanning,
                other => other,
            };
            run.advance(next);
        }

        let plan = self
            .planner
            .plan(input, &self.authorization)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let rendered = plan.render();
        self.run.lock().await.plans.push(plan);
        Ok(rendered)
    }
}

/// `api_controller`: executes a plan for the orchestrator loop
pub struct ControllerTool {
    controller: Arc<ApiController>,
    authorization: Arc<DeleteAuthorization>,
    run: Arc<Mutex<RunState>>,
}

#[async_trait]
impl Tool for ControllerTool {
    fn name(&self) -> String {
        API_CONTROLLER_TOOL_NAME.into()
    }

    fn description(&self) -> String {
        API_CONTROLLER_TOOL_DESCRIPTION.into()
    }

    async fn call(&self, input: &str) -> ToolResult<String> {
        {
            let mut run = self.run.lock().await;
            if run.plans.is_empty() {
                return Err(ToolError::ExecutionFailed(format!(
                    "No plan has been made yet. Call {API_PLANNER_TOOL_NAME} first."
                )));
            }
            run.advance(Phase::Executing);
        }

        match self
            .controller
            .execute(input, self.authorization.clone())
            .await
        {
            Ok(trace) => {
                let answer = trace.answer().unwrap_or(ITERATION_LIMIT_MESSAGE).to_string();
                self.run.lock().await.controller_traces.push(trace);
                Ok(answer)
            }
            // The plan names an endpoint the API lacks; the delegate can re-plan
            Err(TrellisError::CatalogError(msg)) => Ok(msg),
            Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}

pub struct ApiOrchestrator {
    llm: Arc<dyn LanguageModel>,
    planner: Arc<ApiPlanner>,
    controller: Arc<ApiController>,
    responder: Option<ResponseGenerator>,
    delete_resources: Vec<String>,
    config: OrchestratorConfig,
}

impl ApiOrchestrator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        catalog: Arc<OperationCatalog>,
        requests: RequestsWrapper,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let planner = Arc::new(ApiPlanner::new(llm.clone(), &catalog)?);
        let delete_resources = catalog.delete_resources();
        let controller = Arc::new(ApiController::new(
            llm.clone(),
            catalog,
            requests,
            config.controller.clone(),
        )?);
        let responder = if config.summarize {
            Some(ResponseGenerator::new(llm.clone())?)
        } else {
            None
        };
        Ok(Self {
            llm,
            planner,
            controller,
            responder,
            delete_resources,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn run(&self, request: UserRequest) -> Result<OrchestratorOutcome> {
        let authorization = Arc::new(DeleteAuthorization::from_request_scoped(
            &request.text,
            &self.delete_resources,
        ));
        if request.confirmed_deletion {
            authorization.confirm();
        }
        info!(
            target: "orchestrator",
            deletion_requested = authorization.requested(),
            deletion_confirmed = authorization.confirmed(),
            "Handling request"
        );

        let run = Arc::new(Mutex::new(RunState::default()));
        let tools = ToolRegistry::with_timeout(self.config.delegate_timeout());
        tools.register(Arc::new(PlannerTool {
            planner: self.planner.clone(),
            authorization: authorization.clone(),
            run: run.clone(),
        }));
        tools.register(Arc::new(ControllerTool {
            controller: self.controller.clone(),
            authorization: authorization.clone(),
            run: run.clone(),
        }));

        let executor = AgentExecutor::new(
            "orchestrator",
            self.llm.clone(),
            PromptTemplate::from_template(API_ORCHESTRATOR_PROMPT)?,
            tools,
            self.config
                .executor
                .clone()
                .requiring_tool(API_CONTROLLER_TOOL_NAME),
        )?;

        let trace = if request.confirmed_deletion {
            let mut trace = ExecutionTrace::new(format!(
                "{}\n(The user has authorized the DELETE operations this request needs.)",
                request.text.trim()
            ));
            trace.record_confirmation("User authorized DELETE operations.");
            trace
        } else {
            ExecutionTrace::new(request.text.trim())
        };

        let trace = match executor.resume(trace).await {
            Ok(trace) => trace,
            Err(e) => {
                run.lock().await.advance(Phase::Failed);
                warn!(target: "orchestrator", error = %e, "Run failed");
                return Err(e);
            }
        };

        let mut state = run.lock().await;
        let finished = matches!(trace.termination, Some(Termination::FinalAnswer(_)));
        if !(finished && state.advance(Phase::Done)) {
            state.advance(Phase::Failed);
        }

        let mut answer = trace.answer().unwrap_or(ITERATION_LIMIT_MESSAGE).to_string();
        if let Some(responder) = &self.responder {
            if state.phase == Phase::Done && !state.controller_traces.is_empty() {
                answer = responder.summarize(&state.controller_traces).await?;
            }
        }

        let plan = state.plans.last().cloned();
        let needs_confirmation = plan
            .as_ref()
            .map(|p| p.needs_confirmation() && !authorization.allows_delete())
            .unwrap_or(false);

        info!(
            target: "orchestrator",
            phase = ?state.phase,
            plans = state.plans.len(),
            controller_runs = state.controller_traces.len(),
            needs_confirmation,
            "Request finished"
        );

        Ok(OrchestratorOutcome {
            answer,
            phase: state.phase,
            phase_history: state.history.clone(),
            trace,
            controller_traces: std::mem::take(&mut state.controller_traces),
            plan,
            needs_confirmation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions_follow_the_state_machine() {
        assert!(Phase::Idle.can_transition_to(Phase::Planning));
        assert!(Phase::Planning.can_transition_to(Phase::Executing));
        assert!(Phase::Executing.can_transition_to(Phase::Replanning));
        assert!(Phase::Replanning.can_transition_to(Phase::Executing));
        assert!(Phase::Executing.can_transition_to(Phase::Done));
        assert!(Phase::Replanning.can_transition_to(Phase::Done));
        assert!(Phase::Planning.can_transition_to(Phase::Failed));
        assert!(!Phase::Idle.can_transition_to(Phase::Executing));
        assert!(!Phase::Planning.can_transition_to(Phase::Done));
        assert!(!Phase::Done.can_transition_to(Phase::Planning));
        assert!(Phase::Failed.is_terminal());
    }

    #[test]
    fn delegate_timeout_covers_the_controller_loop() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.delegate_timeout(), Duration::from_secs(90 * 15));

        let mut config = OrchestratorConfig::default();
        config.controller.executor =
            ExecutorConfig::default().with_max_execution_time(Duration::from_secs(120));
        assert_eq!(config.delegate_timeout(), Duration::from_secs(210));

        config.delegate_timeout = Some(Duration::from_secs(5));
        assert_eq!(config.delegate_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn run_state_ignores_illegal_moves() {
        let mut run = RunState::default();
        assert!(!run.advance(Phase::Done));
        assert!(run.advance(Phase::Planning));
        assert!(run.advance(Phase::Planning));
        assert!(run.advance(Phase::Executing));
        assert_eq!(run.history, vec![Phase::Idle, Phase::Planning, Phase::Executing]);
    }
}
