//! Operation catalog: the endpoints an agent may plan against.
//!
//! Built by hand or reduced from an OpenAPI document. Reduction keeps only what
//! the planner and controller prompts need: a one-line description per endpoint
//! and trimmed docs (description, required parameters, the 200 response and the
//! request body), with local `$ref`s inlined.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::tools::authorization::resource_stem;
use crate::{Result, TrellisError};

/// HTTP verb of a catalog operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(TrellisError::CatalogError(format!(
                "unsupported method: {other}"
            ))),
        }
    }
}

/// One operation of the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: Method,
    /// Path template, e.g. `/users/{id}/cart`
    pub path: String,
    pub description: String,
    /// Reduced OpenAPI docs rendered into the controller prompt
    #[serde(default)]
    pub docs: Value,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            description: description.into(),
            docs: Value::Null,
        }
    }

    pub fn with_docs(mut self, docs: Value) -> Self {
        self.docs = docs;
        self
    }

    /// `"<VERB> <path>"`
    pub fn name(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Whether a concrete `"<VERB> <route>"` refers to this endpoint; `{param}`
    /// segments of the template match any single path segment.
    pub fn matches(&self, endpoint_name: &str) -> bool {
        let Some((verb, route)) = endpoint_name.split_once(' ') else {
            return false;
        };
        if !verb.eq_ignore_ascii_case(self.method.as_str()) {
            return false;
        }
        let mut pattern = String::from("^");
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            pattern.push_str(&regex::escape(&rest[..open]));
            match rest[open..].find('}') {
                Some(close) => {
                    pattern.push_str("[^/]+");
                    rest = &rest[open + close + 1..];
                }
                None => {
                    rest = &rest[open..];
                    break;
                }
            }
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push_str("/?$");
        Regex::new(&pattern)
            .map(|re| re.is_match(route.trim()))
            .unwrap_or(false)
    }
}

/// Read-only reference data describing the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationCatalog {
    pub base_url: String,
    #[serde(default)]
    pub description: String,
    pub endpoints: Vec<Endpoint>,
}

const REF_DEPTH_LIMIT: usize = 8;

impl OperationCatalog {
    pub fn new(base_url: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            base_url: base_url.into(),
            description: String::new(),
            endpoints,
        }
    }

    /// Parse an OpenAPI document given as JSON or YAML text
    pub fn from_openapi_str(text: &str) -> Result<Self> {
        let spec: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => serde_yaml::from_str(text)?,
        };
        Self::from_openapi(&spec)
    }

    pub fn from_openapi(spec: &Value) -> Result<Self> {
        let base_url = spec
            .pointer("/servers/0/url")
            .and_then(Value::as_str)
            .ok_or_else(|| TrellisError::CatalogError("spec declares no servers[0].url".into()))?
            .to_string();
        let description = spec
            .pointer("/info/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let paths = spec
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| TrellisError::CatalogError("spec has no paths".into()))?;

        let mut endpoints = Vec::new();
        for (route, operations) in paths {
            let Some(operations) = operations.as_object() else {
                continue;
            };
            for (operation_name, docs) in operations {
                // Skip path-level keys such as `parameters` and `summary`
                let Ok(method) = operation_name.parse::<Method>() else {
                    continue;
                };
                let docs = dereference(docs, spec, 0);
                let description = docs
                    .get("description")
                    .or_else(|| docs.get("summary"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                endpoints.push(
                    Endpoint::new(method, route.clone(), description)
                        .with_docs(reduce_endpoint_docs(&docs)),
                );
            }
        }
        debug!(target: "catalog", base_url = %base_url, endpoints = endpoints.len(), "Reduced OpenAPI spec");

        Ok(Self {
            base_url,
            description,
            endpoints,
        })
    }

    /// Endpoint lines for the planner prompt
    pub fn endpoint_descriptions(&self) -> String {
        self.endpoints
            .iter()
            .map(|e| {
                if e.description.is_empty() {
                    format!("- {}", e.name())
                } else {
                    format!("- {} {}", e.name(), e.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Stemmed literal path segments of every DELETE endpoint, e.g. `user`
    /// and `cart` for `DELETE /users/{id}/cart`
    pub fn delete_resources(&self) -> Vec<String> {
        let mut resources: Vec<String> = self
            .endpoints
            .iter()
            .filter(|e| e.method == Method::Delete)
            .flat_map(|e| e.path.split(['/', '-', '_', '.']))
            .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
            .map(resource_stem)
            .collect();
        resources.sort();
        resources.dedup();
        resources
    }

    pub fn find(&self, endpoint_name: &str) -> Vec<&Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.matches(endpoint_name))
            .collect()
    }

    /// Documentation for every endpoint a plan mentions.
    ///
    /// Fails with `"<name> endpoint does not exist."` for the first mentioned
    /// endpoint that is not in the catalog.
    pub fn docs_for_plan(&self, plan: &str) -> Result<String> {
        let mut docs = String::new();
        for endpoint_name in endpoints_in_plan(plan) {
            let found = self.find(&endpoint_name);
            if found.is_empty() {
                return Err(TrellisError::CatalogError(format!(
                    "{endpoint_name} endpoint does not exist."
                )));
            }
            for endpoint in found {
                let rendered = serde_yaml::to_string(&endpoint.docs)?;
                docs.push_str(&format!("== Docs for {endpoint_name} == \n{rendered}\n"));
            }
        }
        Ok(docs)
    }
}

/// `"<VERB> <route>"` for every call named in a plan, query strings removed
pub fn endpoints_in_plan(plan: &str) -> Vec<String> {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"\b(GET|POST|PATCH|DELETE)\s+(/\S*)").expect("static regex")
    });
    re.captures_iter(plan)
        .map(|caps| {
            let route = caps[2].split('?').next().unwrap_or_default();
            let route = route.trim_end_matches(|c: char| ".,;:)'\"".contains(c));
            format!("{} {}", &caps[1], route)
        })
        .collect()
}

fn reduce_endpoint_docs(docs: &Value) -> Value {
    let mut out = Map::new();
    if let Some(description) = docs.get("description").filter(|d| !d.is_null()) {
        out.insert("description".into(), description.clone());
    }
    if let Some(params) = docs.get("parameters").and_then(Value::as_array) {
        let required: Vec<Value> = params
            .iter()
            .filter(|p| p.get("required").and_then(Value::as_bool).unwrap_or(false))
            .cloned()
            .collect();
        if !required.is_empty() {
            out.insert("parameters".into(), Value::Array(required));
        }
    }
    if let Some(ok) = docs.pointer("/responses/200") {
        out.insert("responses".into(), ok.clone());
    }
    if let Some(body) = docs.get("requestBody") {
        out.insert("requestBody".into(), body.clone());
    }
    Value::Object(out)
}

/// Inline local `{"$ref": "#/..."}` objects, giving up past a fixed depth so
/// recursive schemas terminate.
fn dereference(value: &Value, spec: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if depth < REF_DEPTH_LIMIT {
                    if let Some(target) = reference
                        .strip_prefix('#')
                        .and_then(|pointer| spec.pointer(pointer))
                    {
                        return dereference(target, spec, depth + 1);
                    }
                }
                return value.clone();
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), dereference(v, spec, depth)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| dereference(v, spec, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Pets", "description": "A pet store"},
            "servers": [{"url": "https://pets.example.com/v1"}],
            "paths": {
                "/pets": {
                    "get": {
                        "description": "List all pets",
                        "parameters": [
                            {"name": "limit", "in": "query", "required": false},
                            {"name": "species", "in": "query", "required": true}
                        ],
                        "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pets"}}}}}
                    },
                    "post": {"summary": "Create a pet", "requestBody": {"content": {}}, "responses": {}}
                },
                "/pets/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "required": true}],
                    "delete": {"description": "Delete a pet", "responses": {"204": {"description": "gone"}}}
                }
            },
            "components": {"schemas": {
                "Pet": {"type": "object", "properties": {"id": {"type": "integer"}}},
                "Pets": {"type": "array", "items": {"$ref": "#/components/schemas/Pet"}}
            }}
        })
    }

    #[test]
    fn delete_resources_name_the_deletable_paths() {
        let catalog = OperationCatalog::from_openapi(&petstore()).unwrap();
        assert_eq!(catalog.delete_resources(), vec!["pet".to_string()]);
    }

    #[test]
    fn reduces_openapi_document() {
        let catalog = OperationCatalog::from_openapi(&petstore()).unwrap();
        assert_eq!(catalog.base_url, "https://pets.example.com/v1");
        assert_eq!(catalog.description, "A pet store");
        assert_eq!(catalog.endpoints.len(), 3);

        let list = &catalog.find("GET /pets")[0];
        assert_eq!(list.description, "List all pets");
        let params = list.docs["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["name"], "species");
        assert_eq!(
            list.docs.pointer("/responses/content/application~1json/schema/items/properties/id/type"),
            Some(&json!("integer"))
        );

        let create = &catalog.find("POST /pets")[0];
        assert_eq!(create.description, "Create a pet");
        assert!(create.docs.get("requestBody").is_some());
    }

    #[test]
    fn path_parameters_match_any_segment() {
        let e = Endpoint::new(Method::Delete, "/users/{id}/cart", "");
        assert!(e.matches("DELETE /users/42/cart"));
        assert!(e.matches("DELETE /users/{id}/cart"));
        assert!(!e.matches("DELETE /users/42/cart/items"));
        assert!(!e.matches("GET /users/42/cart"));
    }

    #[test]
    fn extracts_endpoints_from_plan_text() {
        let plan = "1. GET /products?q=couch to search couches\n2. GET /user, to find the id\n3. POST /users/{id}/cart to add it";
        assert_eq!(
            endpoints_in_plan(plan),
            vec!["GET /products", "GET /user", "POST /users/{id}/cart"]
        );
    }

    #[test]
    fn docs_for_plan_reports_unknown_endpoints() {
        let catalog = OperationCatalog::from_openapi(&petstore()).unwrap();
        let docs = catalog.docs_for_plan("1. GET /pets to list pets").unwrap();
        assert!(docs.starts_with("== Docs for GET /pets == \n"));
        assert!(docs.contains("List all pets"));

        let err = catalog.docs_for_plan("1. GET /owners to list owners").unwrap_err();
        assert_eq!(err.to_string(), "Catalog error: GET /owners endpoint does not exist.");
    }

    #[test]
    fn parses_yaml_documents() {
        let yaml = "servers:\n  - url: http://localhost:9000\npaths:\n  /health:\n    get:\n      description: Health check\n";
        let catalog = OperationCatalog::from_openapi_str(yaml).unwrap();
        assert_eq!(catalog.endpoint_descriptions(), "- GET /health Health check");
    }
}
