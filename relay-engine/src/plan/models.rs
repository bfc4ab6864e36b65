// Build Plan Data Models
// The declarative, serializable tree a build is compiled from

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identity of a plan node, used to route events back to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlanId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A node of a build plan.
///
/// Serialized as a map holding `id` plus exactly one step-kind key:
///
/// ```yaml
/// id: "1"
/// ensure:
///   step: { id: "2", task: { name: test, script: "cargo test" } }
///   next: { id: "3", task: { name: cleanup } }
/// ```
///
/// The retry attempts path is not part of the serialized form; it is
/// computed while compiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    #[serde(flatten)]
    pub step: PlanStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStep {
    Aggregate(Vec<Plan>),
    Do(Vec<Plan>),
    Timeout(TimeoutPlan),
    Try(TryPlan),
    OnAbort(HookPlan),
    OnSuccess(HookPlan),
    OnFailure(HookPlan),
    Ensure(HookPlan),
    Retry(Vec<Plan>),
    Task(TaskPlan),
    Get(GetPlan),
    Put(PutPlan),
}

impl PlanStep {
    /// Every serialized step-kind key, in declaration order.
    pub const KINDS: &'static [&'static str] = &[
        "aggregate",
        "do",
        "timeout",
        "try",
        "on_abort",
        "on_success",
        "on_failure",
        "ensure",
        "retry",
        "task",
        "get",
        "put",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            PlanStep::Aggregate(_) => "aggregate",
            PlanStep::Do(_) => "do",
            PlanStep::Timeout(_) => "timeout",
            PlanStep::Try(_) => "try",
            PlanStep::OnAbort(_) => "on_abort",
            PlanStep::OnSuccess(_) => "on_success",
            PlanStep::OnFailure(_) => "on_failure",
            PlanStep::Ensure(_) => "ensure",
            PlanStep::Retry(_) => "retry",
            PlanStep::Task(_) => "task",
            PlanStep::Get(_) => "get",
            PlanStep::Put(_) => "put",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPlan {
    pub step: Box<Plan>,
    /// Duration string such as `"90s"` or `"1h30m"`, parsed at compile time.
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryPlan {
    pub step: Box<Plan>,
}

/// A `(step, next)` pair shared by on_success, on_failure, on_abort and ensure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookPlan {
    pub step: Box<Plan>,
    pub next: Box<Plan>,
}

/// Run a unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Fetch a version of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPlan {
    pub name: String,
    /// Resource to fetch from; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub version: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Publish a new version of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl GetPlan {
    pub fn resource(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }
}

impl PutPlan {
    pub fn resource(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }
}

impl Plan {
    pub fn new(id: impl Into<PlanId>, step: PlanStep) -> Self {
        Self {
            id: id.into(),
            step,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.step.kind()
    }

    /// Name of a leaf plan, `None` for combinators.
    pub fn leaf_name(&self) -> Option<&str> {
        match &self.step {
            PlanStep::Task(task) => Some(&task.name),
            PlanStep::Get(get) => Some(&get.name),
            PlanStep::Put(put) => Some(&put.name),
            _ => None,
        }
    }

    /// Direct sub-plans in declared order.
    pub fn children(&self) -> Vec<&Plan> {
        match &self.step {
            PlanStep::Aggregate(plans) | PlanStep::Do(plans) | PlanStep::Retry(plans) => {
                plans.iter().collect()
            }
            PlanStep::Timeout(timeout) => vec![&*timeout.step],
            PlanStep::Try(try_plan) => vec![&*try_plan.step],
            PlanStep::OnAbort(hook)
            | PlanStep::OnSuccess(hook)
            | PlanStep::OnFailure(hook)
            | PlanStep::Ensure(hook) => vec![&*hook.step, &*hook.next],
            PlanStep::Task(_) | PlanStep::Get(_) | PlanStep::Put(_) => Vec::new(),
        }
    }

    /// Total number of nodes in this tree, retry attempt templates included.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

impl From<String> for PlanId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, name: &str) -> Plan {
        Plan::new(
            id,
            PlanStep::Task(TaskPlan {
                name: name.to_string(),
                script: None,
                env: BTreeMap::new(),
            }),
        )
    }

    #[test]
    fn test_kind_keys_match_serialized_form() {
        let plan = Plan::new(
            "1",
            PlanStep::OnFailure(HookPlan {
                step: Box::new(task("2", "build")),
                next: Box::new(task("3", "notify")),
            }),
        );
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["id"], "1");
        assert!(json.get("on_failure").is_some());
        assert!(PlanStep::KINDS.contains(&plan.kind()));
    }

    #[test]
    fn test_children_and_node_count() {
        let plan = Plan::new(
            "1",
            PlanStep::Do(vec![
                task("2", "a"),
                Plan::new("3", PlanStep::Retry(vec![task("4", "b"), task("5", "b")])),
            ]),
        );
        assert_eq!(plan.children().len(), 2);
        assert_eq!(plan.node_count(), 5);
        assert_eq!(plan.children()[0].leaf_name(), Some("a"));
        assert_eq!(plan.leaf_name(), None);
    }

    #[test]
    fn test_resource_defaults_to_name() {
        let get = GetPlan {
            name: "source".to_string(),
            resource: None,
            version: BTreeMap::new(),
            params: BTreeMap::new(),
            script: None,
        };
        assert_eq!(get.resource(), "source");
    }
}
