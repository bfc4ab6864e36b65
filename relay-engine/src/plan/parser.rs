// Build Plan Parser
// Loads plan documents (YAML or JSON) and rejects unknown step kinds up front

use crate::error::{EngineError, EngineResult};
use crate::plan::models::{Plan, PlanStep};

use serde_yaml::Value;
use std::fs;
use std::path::Path;

pub struct PlanParser;

impl PlanParser {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Plan> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a plan document. JSON documents are accepted as YAML.
    pub fn from_str(content: &str) -> EngineResult<Plan> {
        let mut document: Value = serde_yaml::from_str(content)?;
        check_node(&mut document)?;
        let plan: Plan = serde_yaml::from_value(document)?;
        Ok(plan)
    }

    pub fn to_yaml(plan: &Plan) -> EngineResult<String> {
        Ok(serde_yaml::to_string(plan)?)
    }

    pub fn to_json(plan: &Plan) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(plan)?)
    }
}

/// Walk the raw document along the plan schema, normalizing numeric ids to
/// strings and making sure every node names exactly one known step kind.
fn check_node(node: &mut Value) -> EngineResult<()> {
    let mapping = match node {
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(EngineError::Parse(format!(
                "plan node must be a mapping, found {}",
                describe_value(other)
            )))
        }
    };

    let id = match mapping.get_mut("id") {
        Some(value) => {
            if let Value::Number(n) = value {
                *value = Value::String(n.to_string());
            }
            value.as_str().unwrap_or("?").to_string()
        }
        None => "?".to_string(),
    };

    let mut kinds = Vec::new();
    for key in mapping.keys() {
        let key = key.as_str().unwrap_or_default();
        if key == "id" {
            continue;
        }
        if !PlanStep::KINDS.contains(&key) {
            return Err(EngineError::UnknownPlanKind {
                id,
                kind: key.to_string(),
            });
        }
        kinds.push(key.to_string());
    }

    let kind = match kinds.len() {
        0 => return Err(EngineError::MissingPlanKind { id }),
        1 => kinds.remove(0),
        _ => return Err(EngineError::AmbiguousPlanKind { id, kinds }),
    };

    let Some(body) = mapping.get_mut(kind.as_str()) else {
        return Ok(());
    };

    match kind.as_str() {
        "aggregate" | "do" | "retry" => {
            if let Value::Sequence(children) = body {
                for child in children {
                    check_node(child)?;
                }
            }
        }
        "timeout" | "try" => {
            if let Some(step) = body.get_mut("step") {
                check_node(step)?;
            }
        }
        "on_abort" | "on_success" | "on_failure" | "ensure" => {
            for field in ["step", "next"] {
                if let Some(child) = body.get_mut(field) {
                    check_node(child)?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
