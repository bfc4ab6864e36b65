// Hook Combinators
// Run a step, then conditionally run a follow-up based on how it ended

use super::{BoxedStep, Disposition, Signals, Step, StepDescription};

use tracing::debug;

/// When the `next` step of a [`HookStep`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// `next` runs iff `step` succeeded.
    OnSuccess,
    /// `next` runs iff `step` failed or timed out.
    OnFailure,
    /// `next` runs iff `step` was aborted.
    OnAbort,
    /// `next` always runs.
    Ensure,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::OnSuccess => "on_success",
            Hook::OnFailure => "on_failure",
            Hook::OnAbort => "on_abort",
            Hook::Ensure => "ensure",
        }
    }

    fn should_run(&self, outcome: &Disposition) -> bool {
        match self {
            Hook::OnSuccess => outcome.succeeded(),
            Hook::OnFailure => outcome.is_failure(),
            Hook::OnAbort => outcome.is_aborted(),
            Hook::Ensure => true,
        }
    }
}

/// `(step, next)` pair; `next` never starts before `step` is terminal.
///
/// The composite disposition is `next`'s when it ran, otherwise `step`'s,
/// with two exceptions that keep outcomes from being masked:
///
/// - `on_abort` reports the abort whatever its hook reports;
/// - `ensure` reports the more severe of the two (aborted > errored >
///   failed > succeeded, `step` winning ties).
///
/// Once the build is unwinding, `on_abort` and `ensure` run `next` on
/// [`Signals::cleanup`]: the hook survives the abort but not a kill.
pub struct HookStep {
    hook: Hook,
    step: BoxedStep,
    next: BoxedStep,
}

impl HookStep {
    pub fn new(hook: Hook, step: BoxedStep, next: BoxedStep) -> Self {
        Self { hook, step, next }
    }
}

pub fn on_success(step: BoxedStep, next: BoxedStep) -> BoxedStep {
    Box::new(HookStep::new(Hook::OnSuccess, step, next))
}

pub fn on_failure(step: BoxedStep, next: BoxedStep) -> BoxedStep {
    Box::new(HookStep::new(Hook::OnFailure, step, next))
}

pub fn on_abort(step: BoxedStep, next: BoxedStep) -> BoxedStep {
    Box::new(HookStep::new(Hook::OnAbort, step, next))
}

pub fn ensure(step: BoxedStep, next: BoxedStep) -> BoxedStep {
    Box::new(HookStep::new(Hook::Ensure, step, next))
}

#[async_trait::async_trait]
impl Step for HookStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        let HookStep { hook, step, next } = *self;

        let outcome = step.run(signals.clone()).await;
        if !hook.should_run(&outcome) {
            return outcome;
        }

        match hook {
            Hook::OnSuccess | Hook::OnFailure => {
                if signals.is_aborted() {
                    debug!(hook = hook.as_str(), "build aborted, skipping hook");
                    return Disposition::Aborted;
                }
                next.run(signals).await
            }
            Hook::OnAbort => {
                let hooked = next.run(signals.cleanup()).await;
                debug!(hook = hook.as_str(), result = %hooked, "abort hook finished");
                outcome
            }
            Hook::Ensure => {
                let signals = if outcome.is_aborted() || signals.is_aborted() {
                    signals.cleanup()
                } else {
                    signals
                };
                let cleanup = next.run(signals).await;
                outcome.worst(cleanup)
            }
        }
    }

    fn describe(&self) -> StepDescription {
        StepDescription::node(
            self.hook.as_str(),
            vec![self.step.describe(), self.next.describe()],
        )
    }
}
