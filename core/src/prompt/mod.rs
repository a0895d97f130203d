//! Prompt templates: `{name}` placeholders, `{{` / `}}` escapes.
//!
//! Templates are rendered in a single pass, so substituted values are copied
//! verbatim even when they contain braces (JSON tool inputs, OpenAPI docs).

pub mod templates;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::legacy::try_load_from_hub;
use crate::{Result, TrellisError};

/// A text template with named placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template: String,
    pub input_variables: Vec<String>,
    #[serde(default)]
    pub partial_variables: BTreeMap<String, String>,
}

enum Segment<'a> {
    Literal(&'a str),
    Escaped(char),
    Variable(&'a str),
}

fn segments(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                out.push(Segment::Literal(&template[literal_start..i]));
                out.push(Segment::Escaped(bytes[i] as char));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let close = template[i + 1..].find('}').ok_or_else(|| {
                    TrellisError::PromptError(format!("unclosed '{{' at byte {i}"))
                })?;
                let name = &template[i + 1..i + 1 + close];
                if name.is_empty() || name.contains('{') {
                    return Err(TrellisError::PromptError(format!(
                        "invalid placeholder at byte {i}"
                    )));
                }
                out.push(Segment::Literal(&template[literal_start..i]));
                out.push(Segment::Variable(name.trim()));
                i += close + 2;
                literal_start = i;
            }
            b'}' => {
                return Err(TrellisError::PromptError(format!(
                    "single '}}' encountered at byte {i}"
                )));
            }
            _ => i += 1,
        }
    }
    out.push(Segment::Literal(&template[literal_start..]));
    Ok(out)
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Self {
        Self {
            template: template.into(),
            input_variables: input_variables.iter().map(|s| s.to_string()).collect(),
            partial_variables: BTreeMap::new(),
        }
    }

    /// Build a template, inferring its variables from the placeholders
    pub fn from_template(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let mut input_variables: Vec<String> = Vec::new();
        for segment in segments(&template)? {
            if let Segment::Variable(name) = segment {
                if !input_variables.iter().any(|v| v == name) {
                    input_variables.push(name.to_string());
                }
            }
        }
        Ok(Self {
            template,
            input_variables,
            partial_variables: BTreeMap::new(),
        })
    }

    /// Fix a variable ahead of time
    pub fn partial(mut self, name: &str, value: impl Into<String>) -> Self {
        self.input_variables.retain(|v| v != name);
        self.partial_variables.insert(name.to_string(), value.into());
        self
    }

    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        for segment in segments(&self.template)? {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Escaped(c) => out.push(c),
                Segment::Variable(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .or_else(|| self.partial_variables.get(name).map(String::as_str))
                        .ok_or_else(|| {
                            TrellisError::PromptError(format!("missing value for '{name}'"))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Load a prompt template.
///
/// Legacy hub paths (`lc://...`) are offered to the deprecated hub loader first;
/// it always declines, so every path ends up read from the filesystem.
/// `.json` and `.yaml`/`.yml` files hold a serialized `PromptTemplate`, anything
/// else is read as raw template text.
pub fn load_prompt(path: impl AsRef<Path>) -> Result<PromptTemplate> {
    let path = path.as_ref();
    if let Some(template) = try_load_from_hub::<PromptTemplate>(&path.to_string_lossy()) {
        return Ok(template);
    }

    debug!(target: "prompt", path = %path.display(), "Loading prompt from file");
    let text = std::fs::read_to_string(path)?;
    let template = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str::<PromptTemplate>(&text)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str::<PromptTemplate>(&text)?,
        _ => return PromptTemplate::from_template(text),
    };
    // Validate the declared template up front
    segments(&template.template)?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_and_unescapes() {
        let t = PromptTemplate::from_template("POST /users/{{id}}/cart for {query}").unwrap();
        assert_eq!(t.input_variables, vec!["query".to_string()]);
        assert_eq!(
            t.format(&[("query", "a lamp")]).unwrap(),
            "POST /users/{id}/cart for a lamp"
        );
    }

    #[test]
    fn values_with_braces_are_copied_verbatim() {
        let t = PromptTemplate::from_template("Action Input: {input}").unwrap();
        let input = r#"{"url": "/user", "params": {}, "output_instructions": "return the user id"}"#;
        assert_eq!(
            t.format(&[("input", input)]).unwrap(),
            format!("Action Input: {input}")
        );
    }

    #[test]
    fn partials_fill_missing_values() {
        let t = PromptTemplate::from_template("{a} and {b}")
            .unwrap()
            .partial("a", "x");
        assert_eq!(t.input_variables, vec!["b".to_string()]);
        assert_eq!(t.format(&[("b", "y")]).unwrap(), "x and y");
    }

    #[test]
    fn missing_value_is_an_error() {
        let t = PromptTemplate::from_template("{a}").unwrap();
        assert!(matches!(t.format(&[]), Err(TrellisError::PromptError(_))));
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(PromptTemplate::from_template("open { never closed").is_err());
        assert!(PromptTemplate::from_template("stray } brace").is_err());
        assert!(PromptTemplate::from_template("empty {} name").is_err());
    }

    #[test]
    fn quadruple_braces_render_as_double() {
        let t = PromptTemplate::from_template("{{{{\n  \"action\": $TOOL_NAME\n}}}}").unwrap();
        assert!(t.input_variables.is_empty());
        assert_eq!(t.format(&[]).unwrap(), "{{\n  \"action\": $TOOL_NAME\n}}");
    }
}
