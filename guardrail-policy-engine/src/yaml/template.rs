// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use serde_json::Value;

use crate::policy::error::{EvaluationError, ParseError};
use crate::yaml::scope::{FieldPath, Scope};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field(FieldPath),
}

/// Message text with `{{ path }}` placeholders, parsed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    parts: Vec<Part>,
}

impl MessageTemplate {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parts = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                parts.push(Part::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                ParseError::new(format!("unclosed placeholder in message '{}'", text))
            })?;
            let path = FieldPath::parse(&after_open[..end])
                .map_err(|e| ParseError::new(format!("in message '{}': {}", text, e)))?;
            parts.push(Part::Field(path));
            rest = &after_open[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Ok(Self { parts })
    }

    pub fn render(&self, scope: &Scope<'_>) -> Result<String, EvaluationError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field(path) => match scope.resolve(path)? {
                    Some(value) => out.push_str(&display_value(value)),
                    None => {
                        return Err(EvaluationError::UndefinedReference {
                            path: path.to_string(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::backend::EvalContext;
    use crate::policy::input::EvaluationInput;
    use crate::policy::interrupt::Interrupt;
    use serde_json::json;

    fn render(template: &str, doc: Value) -> Result<String, EvaluationError> {
        let input = EvaluationInput::from_document(doc).unwrap();
        let data = json!({});
        let interrupt = Interrupt::none();
        let ctx = EvalContext {
            input: &input,
            data: &data,
            interrupt: &interrupt,
        };
        MessageTemplate::parse(template).unwrap().render(&Scope::new(&ctx))
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("no placeholders", json!({})).unwrap(), "no placeholders");
    }

    #[test]
    fn test_interpolates_strings_and_numbers() {
        let out = render(
            "{{name}} has {{ replicas }} replicas",
            json!({"name": "web", "replicas": 3}),
        )
        .unwrap();
        assert_eq!(out, "web has 3 replicas");
    }

    #[test]
    fn test_undefined_placeholder_is_an_error() {
        let err = render("image {{ object.image }}", json!({})).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::UndefinedReference {
                path: "object.image".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(MessageTemplate::parse("oops {{ name").is_err());
        assert!(MessageTemplate::parse("empty {{ }}").is_err());
    }
}
