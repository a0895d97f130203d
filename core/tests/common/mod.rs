#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use trellis_core::{LanguageModel, Result, TrellisError};

/// Which prompt a completion request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Planner,
    Controller,
    Orchestrator,
    Extractor,
    Responder,
}

impl Stage {
    pub fn of(prompt: &str) -> Stage {
        if prompt.starts_with("You are a planner") {
            Stage::Planner
        } else if prompt.starts_with("You are an agent that gets a sequence") {
            Stage::Controller
        } else if prompt.starts_with("You are an agent that assists") {
            Stage::Orchestrator
        } else if prompt.starts_with("Here is an API response") {
            Stage::Extractor
        } else {
            Stage::Responder
        }
    }
}

/// Replays canned replies per stage and records every prompt it sees
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<HashMap<Stage, VecDeque<String>>>,
    seen: Mutex<Vec<(Stage, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, stage: Stage, replies: &[&str]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .extend(replies.iter().map(|r| r.to_string()));
        self
    }

    pub fn prompts(&self, stage: Stage) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn remaining(&self, stage: Stage) -> usize {
        self.replies
            .lock()
            .unwrap()
            .get(&stage)
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _stop: &[String]) -> Result<String> {
        let stage = Stage::of(prompt);
        self.seen.lock().unwrap().push((stage, prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| TrellisError::LlmError(format!("no scripted reply for {stage:?}")))
    }
}

/// A small shopping API in OpenAPI 3 form; `base_url` replaces the server URL
pub fn shop_openapi(base_url: &str) -> String {
    serde_json::json!({
        "openapi": "3.0.0",
        "info": {"title": "Shop", "description": "A shopping API", "version": "1"},
        "servers": [{"url": base_url}],
        "paths": {
            "/user": {
                "get": {
                    "summary": "Get the current user",
                    "responses": {"200": {"description": "the user"}}
                }
            },
            "/items": {
                "get": {
                    "summary": "Search items",
                    "parameters": [{"name": "trending", "in": "query", "required": false}],
                    "responses": {"200": {"description": "matching items"}}
                }
            },
            "/users/{id}/cart": {
                "post": {
                    "summary": "Create a cart for the user",
                    "responses": {"200": {"description": "the new cart"}}
                },
                "delete": {
                    "summary": "Delete the user's cart",
                    "responses": {"200": {"description": "deleted"}}
                }
            }
        }
    })
    .to_string()
}
