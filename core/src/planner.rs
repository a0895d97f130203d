//! Planner: turns a user query into an ordered plan of API calls.
//!
//! The plan text comes from the model. It is parsed into steps so the delete
//! policy can be applied before the plan reaches the controller: a request
//! that asks for deletion gets its DELETE steps without authorization lines;
//! any other request gets an authorization line in front of every DELETE step.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Method, OperationCatalog};
use crate::llm::LanguageModel;
use crate::prompt::templates::{
    API_PLANNER_PROMPT, DELETE_AUTH_ASK, DELETE_AUTH_CHECK, DELETE_AUTH_PROCEED,
};
use crate::prompt::PromptTemplate;
use crate::tools::DeleteAuthorization;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    /// An API call
    Call { method: Method, path: String },
    /// "DELETE required. Did user specify DELETE or previously authorize? ..."
    AuthorizationCheck { granted: bool },
    /// Anything else, e.g. a question for the user
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub kind: StepKind,
    /// Step text without its number
    pub text: String,
}

/// The authorization line in either prompt language:
/// "DELETE required. Did user specify DELETE or previously authorize? ..." or
/// "Требуется DELETE. Пользователь указал DELETE или ранее авторизовал? ..."
fn is_authorization_line(lower: &str) -> bool {
    lower.contains("delete required")
        || lower.contains("previously authorize")
        || lower.contains("требуется delete")
        || lower.contains("ранее авторизовал")
}

impl PlanStep {
    pub fn parse(text: &str) -> Self {
        let text = text.trim().to_string();
        let lower = text.to_lowercase();
        if is_authorization_line(&lower) {
            let granted = lower.contains("yes") || lower.contains("да,") || lower.contains("продолжить");
            return Self {
                kind: StepKind::AuthorizationCheck { granted },
                text,
            };
        }
        if let Some(caps) = call_re().captures(&text) {
            if let Ok(method) = caps[1].parse::<Method>() {
                let path = caps[2]
                    .trim_end_matches(|c: char| ".,;:)'\"".contains(c))
                    .to_string();
                return Self {
                    kind: StepKind::Call { method, path },
                    text,
                };
            }
        }
        Self {
            kind: StepKind::Note,
            text,
        }
    }

    pub fn authorization_check(granted: bool) -> Self {
        let answer = if granted { DELETE_AUTH_PROCEED } else { DELETE_AUTH_ASK };
        Self {
            kind: StepKind::AuthorizationCheck { granted },
            text: format!("{DELETE_AUTH_CHECK} {answer}"),
        }
    }

    pub fn is_destructive_call(&self) -> bool {
        matches!(&self.kind, StepKind::Call { method, .. } if method.is_destructive())
    }

    pub fn is_authorization_check(&self) -> bool {
        matches!(self.kind, StepKind::AuthorizationCheck { .. })
    }
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE)\s+(/\S*)").expect("static regex"))
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*[.)]\s*(.*)$").expect("static regex"))
}

/// An ordered plan, or the planner's refusal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// Set when the model produced no numbered steps
    pub refusal: Option<String>,
}

impl Plan {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let text = text.strip_prefix("Plan:").unwrap_or(text).trim();

        let mut raw_steps: Vec<String> = Vec::new();
        for line in text.lines() {
            if let Some(caps) = numbered_re().captures(line) {
                raw_steps.push(caps[2].to_string());
            } else if let Some(last) = raw_steps.last_mut() {
                if !line.trim().is_empty() {
                    last.push('\n');
                    last.push_str(line.trim());
                }
            }
        }

        if raw_steps.is_empty() {
            return Self {
                steps: Vec::new(),
                refusal: Some(text.to_string()),
            };
        }
        Self {
            steps: raw_steps.iter().map(|s| PlanStep::parse(s)).collect(),
            refusal: None,
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.refusal.is_some()
    }

    /// Numbered plan text, or the refusal
    pub fn render(&self) -> String {
        if let Some(refusal) = &self.refusal {
            return refusal.clone();
        }
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn calls(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.steps.iter().filter_map(|s| match &s.kind {
            StepKind::Call { method, path } => Some((method, path.as_str())),
            _ => None,
        })
    }

    pub fn has_destructive_call(&self) -> bool {
        self.steps.iter().any(PlanStep::is_destructive_call)
    }

    /// The plan waits on the user to authorize a deletion
    pub fn needs_confirmation(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.kind == StepKind::AuthorizationCheck { granted: false })
    }

    /// Enforce the delete policy for the request behind this plan.
    pub fn apply_delete_policy(&mut self, authorization: &DeleteAuthorization) {
        if authorization.requested() {
            self.steps.retain(|s| !s.is_authorization_check());
            return;
        }

        let granted = authorization.confirmed();
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        for step in self.steps.drain(..) {
            if step.is_authorization_check() {
                steps.push(PlanStep::authorization_check(granted));
                continue;
            }
            if step.is_destructive_call()
                && !steps.last().map(PlanStep::is_authorization_check).unwrap_or(false)
            {
                steps.push(PlanStep::authorization_check(granted));
            }
            steps.push(step);
        }
        self.steps = steps;
    }
}

/// Generates plans from the planner prompt and the catalog's endpoint list
pub struct ApiPlanner {
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
}

impl ApiPlanner {
    pub fn new(llm: Arc<dyn LanguageModel>, catalog: &OperationCatalog) -> Result<Self> {
        let prompt = PromptTemplate::from_template(API_PLANNER_PROMPT)?
            .partial("endpoints", catalog.endpoint_descriptions());
        Ok(Self { llm, prompt })
    }

    pub async fn plan(&self, query: &str, authorization: &DeleteAuthorization) -> Result<Plan> {
        let prompt = self.prompt.format(&[("query", query)])?;
        let stop = vec!["\nUser query:".to_string()];
        let text = self.llm.complete(&prompt, &stop).await?;
        let text = crate::llm::truncate_at_stop(&text, &stop);
        debug!(target: "planner", raw = %text, "Planner output");

        let mut plan = Plan::parse(text);
        if !plan.is_refusal() {
            plan.apply_delete_policy(authorization);
        }
        info!(
            target: "planner",
            steps = plan.steps.len(),
            refusal = plan.is_refusal(),
            needs_confirmation = plan.needs_confirmation(),
            "Plan ready"
        );
        Ok(plan)
    }
}
