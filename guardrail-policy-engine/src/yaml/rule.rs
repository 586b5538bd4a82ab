// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::backend::RuleCollection;
use crate::policy::error::{EvaluationError, ParseError};
use crate::policy::input::json_type_name;
use crate::policy::interrupt::Interrupt;
use crate::yaml::definition::{ConditionDefinition, ModuleDefinition, RuleDefinition};
use crate::yaml::scope::{FieldPath, Scope, DATA_ROOT, INPUT_ROOT};
use crate::yaml::template::MessageTemplate;

/// Operators supported in `when` conditions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Field is present and non-null
    Exists,
    /// Field is missing or null
    Absent,
    /// Field equals value
    Eq,
    /// Field not equals value
    Neq,
    /// Field less than value
    Lt,
    /// Field less than or equal to value
    Lte,
    /// Field greater than value
    Gt,
    /// Field greater than or equal to value
    Gte,
    /// Field contains value (string or array)
    Contains,
    /// Field matches regex pattern
    Matches,
    StartsWith,
    EndsWith,
    /// Field equals one of the listed values
    In,
}

impl Operator {
    pub fn takes_value(self) -> bool {
        !matches!(self, Operator::Exists | Operator::Absent)
    }
}

/// A compiled `when` entry
#[derive(Debug, Clone)]
pub struct Condition {
    path: FieldPath,
    operator: Operator,
    value: Option<Value>,
    pattern: Option<Regex>,
}

impl Condition {
    pub fn compile(def: &ConditionDefinition) -> Result<Self, ParseError> {
        let path = FieldPath::parse(&def.field)?;
        let operator = def.operator;

        match (&def.value, operator.takes_value()) {
            (None, true) => {
                return Err(ParseError::new(format!(
                    "condition on '{}': operator {:?} requires a value",
                    def.field, operator
                )))
            }
            (Some(_), false) => {
                return Err(ParseError::new(format!(
                    "condition on '{}': operator {:?} does not take a value",
                    def.field, operator
                )))
            }
            _ => {}
        }

        let pattern = match (operator, &def.value) {
            (Operator::Matches, Some(Value::String(pattern))) => {
                Some(Regex::new(pattern).map_err(|e| {
                    ParseError::new(format!("condition on '{}': invalid regex: {}", def.field, e))
                })?)
            }
            (Operator::Matches | Operator::StartsWith | Operator::EndsWith, Some(other))
                if !other.is_string() =>
            {
                return Err(ParseError::new(format!(
                    "condition on '{}': operator {:?} expects a string, found {}",
                    def.field,
                    operator,
                    json_type_name(other)
                )))
            }
            (Operator::In, Some(value)) if !value.is_array() => {
                return Err(ParseError::new(format!(
                    "condition on '{}': operator In expects a list",
                    def.field
                )))
            }
            _ => None,
        };

        Ok(Self {
            path,
            operator,
            value: def.value.clone(),
            pattern,
        })
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Whether the condition holds for the resolved field; `None` is undefined.
    pub fn holds(&self, field: Option<&Value>) -> bool {
        let field = match (field, self.operator) {
            (None, Operator::Absent) | (Some(Value::Null), Operator::Absent) => return true,
            (None, _) | (_, Operator::Absent) => return false,
            (Some(Value::Null), Operator::Exists) => return false,
            (Some(_), Operator::Exists) => return true,
            (Some(field), _) => field,
        };
        let Some(expected) = self.value.as_ref() else {
            return false;
        };

        match self.operator {
            Operator::Eq => values_equal(field, expected),
            Operator::Neq => !values_equal(field, expected),
            Operator::Lt => compare_numbers(field, expected, |f, v| f < v),
            Operator::Lte => compare_numbers(field, expected, |f, v| f <= v),
            Operator::Gt => compare_numbers(field, expected, |f, v| f > v),
            Operator::Gte => compare_numbers(field, expected, |f, v| f >= v),
            Operator::Contains => match (field, expected) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                _ => false,
            },
            Operator::Matches => match (field, &self.pattern) {
                (Value::String(text), Some(re)) => re.is_match(text),
                _ => false,
            },
            Operator::StartsWith => match (field, expected) {
                (Value::String(text), Value::String(prefix)) => text.starts_with(prefix.as_str()),
                _ => false,
            },
            Operator::EndsWith => match (field, expected) {
                (Value::String(text), Value::String(suffix)) => text.ends_with(suffix.as_str()),
                _ => false,
            },
            Operator::In => match expected {
                Value::Array(options) => options.iter().any(|option| values_equal(field, option)),
                _ => false,
            },
            Operator::Exists | Operator::Absent => false,
        }
    }
}

/// Numbers compare by value so `1` and `1.0` are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_numbers<F>(field: &Value, expected: &Value, comparator: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (field.as_f64(), expected.as_f64()) {
        (Some(f), Some(v)) => comparator(f, v),
        _ => false,
    }
}

#[derive(Debug, Clone)]
struct Generator {
    collection: FieldPath,
    binding: String,
}

/// A compiled rule: nested generators, a conjunction of conditions, a message.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    generators: Vec<Generator>,
    conditions: Vec<Condition>,
    message: MessageTemplate,
}

impl CompiledRule {
    pub fn compile(def: &RuleDefinition, label: &str) -> Result<Self, ParseError> {
        let in_rule = |e: ParseError| ParseError::new(format!("rule {}: {}", label, e.message));

        if def.message.trim().is_empty() {
            return Err(in_rule(ParseError::new("message must not be empty")));
        }

        let mut seen = HashSet::new();
        let mut generators = Vec::with_capacity(def.each.len());
        for generator in &def.each {
            let binding = generator.binding.trim();
            if binding.is_empty() || binding.contains('.') {
                return Err(in_rule(ParseError::new(format!(
                    "invalid binding name '{}'",
                    generator.binding
                ))));
            }
            if binding == DATA_ROOT || binding == INPUT_ROOT {
                return Err(in_rule(ParseError::new(format!(
                    "binding name '{}' is reserved",
                    binding
                ))));
            }
            if !seen.insert(binding.to_string()) {
                return Err(in_rule(ParseError::new(format!(
                    "binding '{}' is declared twice",
                    binding
                ))));
            }
            generators.push(Generator {
                collection: FieldPath::parse(&generator.collection).map_err(in_rule)?,
                binding: binding.to_string(),
            });
        }

        let conditions = def
            .when
            .iter()
            .map(Condition::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_rule)?;
        let message = MessageTemplate::parse(&def.message).map_err(in_rule)?;

        Ok(Self {
            generators,
            conditions,
            message,
        })
    }

    /// Add every message this rule produces to `out`.
    pub fn evaluate<'s>(
        &'s self,
        scope: &mut Scope<'s>,
        interrupt: &Interrupt,
        out: &mut BTreeSet<String>,
    ) -> Result<(), EvaluationError> {
        self.expand(0, scope, interrupt, out)
    }

    fn expand<'s>(
        &'s self,
        depth: usize,
        scope: &mut Scope<'s>,
        interrupt: &Interrupt,
        out: &mut BTreeSet<String>,
    ) -> Result<(), EvaluationError> {
        let Some(generator) = self.generators.get(depth) else {
            for condition in &self.conditions {
                if !condition.holds(scope.resolve(condition.path())?) {
                    return Ok(());
                }
            }
            out.insert(self.message.render(scope)?);
            return Ok(());
        };

        match scope.resolve(&generator.collection)? {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Array(items)) => {
                for item in items {
                    interrupt.check()?;
                    scope.push(&generator.binding, item);
                    let expanded = self.expand(depth + 1, scope, interrupt, out);
                    scope.pop();
                    expanded?;
                }
                Ok(())
            }
            Some(other) => Err(EvaluationError::NotIterable {
                path: generator.collection.to_string(),
                found: json_type_name(other),
            }),
        }
    }
}

/// Compiled form of one YAML rule file
#[derive(Debug, Clone)]
pub struct YamlModule {
    package: String,
    deny: Vec<CompiledRule>,
    warn: Vec<CompiledRule>,
}

impl YamlModule {
    pub fn compile(def: ModuleDefinition) -> Result<Self, ParseError> {
        let compile_all = |collection: RuleCollection, rules: &[RuleDefinition]| {
            rules
                .iter()
                .enumerate()
                .map(|(index, rule)| {
                    let label = match &rule.name {
                        Some(name) => format!("'{}' in {}", name, collection),
                        None => format!("{}[{}]", collection, index),
                    };
                    CompiledRule::compile(rule, &label)
                })
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            deny: compile_all(RuleCollection::Deny, &def.deny)?,
            warn: compile_all(RuleCollection::Warn, &def.warn)?,
            package: def.package,
        })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn rules(&self, collection: RuleCollection) -> &[CompiledRule] {
        match collection {
            RuleCollection::Deny => &self.deny,
            RuleCollection::Warn => &self.warn,
        }
    }
}
