// Steps
// The run-once step capability and the combinators composing it

pub mod aggregate;
pub mod hooks;
pub mod identity;
pub mod retry;
pub mod signals;
pub mod timeout;
pub mod try_step;

pub use aggregate::AggregateStep;
pub use hooks::{ensure, on_abort, on_failure, on_success, Hook, HookStep};
pub use identity::IdentityStep;
pub use retry::{PendingAttempt, RetryStep};
pub use signals::Signals;
pub use timeout::TimeoutStep;
pub use try_step::TryStep;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Something that can be run exactly once and reports how it ended.
///
/// `run` consumes the step, so a compiled tree cannot be run twice.
/// Implementations should observe `signals` wherever they block and return
/// [`Disposition::Aborted`] promptly once it fires.
#[async_trait::async_trait]
pub trait Step: Send {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition;

    /// Structural summary used for logging and comparing compiled trees.
    fn describe(&self) -> StepDescription {
        StepDescription::leaf("step")
    }
}

pub type BoxedStep = Box<dyn Step>;

/// Terminal outcome of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Succeeded,
    /// Ran and did not succeed.
    Failed,
    /// Cancelled by a timeout after the given deadline; counts as a failure.
    TimedOut(Duration),
    /// Cancelled by an external abort.
    Aborted,
    /// Could not be attempted at all.
    Errored(String),
}

impl Disposition {
    pub fn succeeded(&self) -> bool {
        matches!(self, Disposition::Succeeded)
    }

    /// True for `Failed` and `TimedOut`, never for aborted or erred steps.
    pub fn is_failure(&self) -> bool {
        matches!(self, Disposition::Failed | Disposition::TimedOut(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Disposition::Aborted)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Disposition::Errored(_))
    }

    /// Aborted > Errored > Failed/TimedOut > Succeeded.
    pub fn severity(&self) -> u8 {
        match self {
            Disposition::Succeeded => 0,
            Disposition::Failed | Disposition::TimedOut(_) => 1,
            Disposition::Errored(_) => 2,
            Disposition::Aborted => 3,
        }
    }

    /// The more severe of the two; `self` wins ties.
    pub fn worst(self, other: Disposition) -> Disposition {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Succeeded => write!(f, "succeeded"),
            Disposition::Failed => write!(f, "failed"),
            Disposition::TimedOut(after) => write!(f, "timed out after {:?}", after),
            Disposition::Aborted => write!(f, "aborted"),
            Disposition::Errored(message) => write!(f, "errored: {}", message),
        }
    }
}

/// Shape of a compiled step tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescription {
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StepDescription>,
}

impl StepDescription {
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn node(label: impl Into<String>, children: Vec<StepDescription>) -> Self {
        Self {
            label: label.into(),
            children,
        }
    }

    /// Indented, one line per step.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.label);
        out.push('\n');
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}
