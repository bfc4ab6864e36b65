// Plan Compiler
// Turns a build plan into a tree of runnable steps

use crate::attempts::Attempts;
use crate::error::{EngineError, EngineResult};
use crate::execution::events::BuildDelegate;
use crate::factory::LeafFactory;
use crate::metadata::{BuildRef, ContainerKind, ContainerMetadata};
use crate::plan::{Plan, PlanStep, TimeoutPlan};
use crate::step::{
    ensure, on_abort, on_failure, on_success, AggregateStep, BoxedStep, IdentityStep,
    PendingAttempt, RetryStep, TimeoutStep, TryStep,
};
use crate::utils::parse_duration;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug_span, info_span};

/// Compiles plans for a single build.
///
/// Compilation is a pure function of `(plan, attempts)`: the plan is never
/// modified, and the attempts path is passed down explicitly. Only `retry`
/// extends it, giving attempt `i` the path `attempts + [i]`.
#[derive(Clone)]
pub struct PlanCompiler {
    factory: Arc<dyn LeafFactory>,
    build: BuildRef,
    delegate: BuildDelegate,
}

impl PlanCompiler {
    pub fn new(factory: Arc<dyn LeafFactory>, build: BuildRef) -> Self {
        Self {
            factory,
            build,
            delegate: BuildDelegate::silent(),
        }
    }

    /// Route leaf step events through `delegate`
    pub fn with_delegate(mut self, delegate: BuildDelegate) -> Self {
        self.delegate = delegate;
        self
    }

    /// Validate and compile a whole plan from the root of the build.
    pub fn compile(&self, plan: &Plan) -> EngineResult<BoxedStep> {
        self.compile_at(plan, &Attempts::root())
    }

    /// Validate and compile `plan` as if nested under `attempts`.
    pub fn compile_at(&self, plan: &Plan, attempts: &Attempts) -> EngineResult<BoxedStep> {
        Self::validate(plan)?;
        self.build_step(plan, attempts)
    }

    /// Check everything that could make compilation fail, including retry
    /// attempts that are only built once they are about to run.
    pub fn validate(plan: &Plan) -> EngineResult<()> {
        match &plan.step {
            PlanStep::Timeout(timeout) => {
                timeout_duration(plan, timeout)?;
            }
            PlanStep::Retry(attempts) if attempts.is_empty() => {
                return Err(EngineError::EmptyRetry {
                    id: plan.id.clone(),
                });
            }
            _ => {}
        }

        for child in plan.children() {
            Self::validate(child)?;
        }
        Ok(())
    }

    fn build_step(&self, plan: &Plan, attempts: &Attempts) -> EngineResult<BoxedStep> {
        match &plan.step {
            PlanStep::Aggregate(plans) => self.build_aggregate(plans, attempts),
            PlanStep::Do(plans) => self.build_do(plans, attempts),
            PlanStep::Timeout(timeout) => {
                let duration = timeout_duration(plan, timeout)?;
                let step = self.build_step(&timeout.step, attempts)?;
                Ok(Box::new(TimeoutStep::new(step, duration)))
            }
            PlanStep::Try(try_plan) => {
                let step = self.build_step(&try_plan.step, attempts)?;
                Ok(Box::new(TryStep::new(step)))
            }
            PlanStep::OnAbort(hook) => Ok(on_abort(
                self.build_step(&hook.step, attempts)?,
                self.build_step(&hook.next, attempts)?,
            )),
            PlanStep::OnSuccess(hook) => Ok(on_success(
                self.build_step(&hook.step, attempts)?,
                self.build_step(&hook.next, attempts)?,
            )),
            PlanStep::OnFailure(hook) => Ok(on_failure(
                self.build_step(&hook.step, attempts)?,
                self.build_step(&hook.next, attempts)?,
            )),
            PlanStep::Ensure(hook) => Ok(ensure(
                self.build_step(&hook.step, attempts)?,
                self.build_step(&hook.next, attempts)?,
            )),
            PlanStep::Retry(plans) => self.build_retry(plan, plans, attempts),
            PlanStep::Task(task) => {
                let span = info_span!("task", name = %task.name, attempts = %attempts);
                let metadata = ContainerMetadata::new(ContainerKind::Task, &task.name, attempts);
                Ok(self.factory.task(
                    span,
                    task,
                    &self.build,
                    metadata,
                    self.delegate.step_delegate(&plan.id),
                ))
            }
            PlanStep::Get(get) => {
                let span = info_span!("get", name = %get.name, attempts = %attempts);
                let metadata = ContainerMetadata::new(ContainerKind::Get, &get.name, attempts);
                Ok(self.factory.get(
                    span,
                    get,
                    &self.build,
                    metadata,
                    self.delegate.step_delegate(&plan.id),
                ))
            }
            PlanStep::Put(put) => {
                let span = info_span!("put", name = %put.name, attempts = %attempts);
                let metadata = ContainerMetadata::new(ContainerKind::Put, &put.name, attempts);
                Ok(self.factory.put(
                    span,
                    put,
                    &self.build,
                    metadata,
                    self.delegate.step_delegate(&plan.id),
                ))
            }
        }
    }

    fn build_aggregate(&self, plans: &[Plan], attempts: &Attempts) -> EngineResult<BoxedStep> {
        let span = debug_span!("aggregate");
        let _enter = span.enter();

        let steps = plans
            .iter()
            .map(|plan| self.build_step(plan, attempts))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Box::new(AggregateStep::new(steps)))
    }

    /// `do [a, b, c]` becomes `on_success(a, on_success(b, on_success(c, identity)))`.
    fn build_do(&self, plans: &[Plan], attempts: &Attempts) -> EngineResult<BoxedStep> {
        let span = debug_span!("do");
        let _enter = span.enter();

        let steps = plans
            .iter()
            .map(|plan| self.build_step(plan, attempts))
            .collect::<EngineResult<Vec<_>>>()?;

        let seed: BoxedStep = Box::new(IdentityStep);
        Ok(steps
            .into_iter()
            .rev()
            .fold(seed, |next, previous| on_success(previous, next)))
    }

    fn build_retry(
        &self,
        plan: &Plan,
        plans: &[Plan],
        attempts: &Attempts,
    ) -> EngineResult<BoxedStep> {
        if plans.is_empty() {
            return Err(EngineError::EmptyRetry {
                id: plan.id.clone(),
            });
        }

        let span = debug_span!("retry", id = %plan.id);
        let pending = plans
            .iter()
            .enumerate()
            .map(|(index, attempt_plan)| {
                let path = attempts.child(index as u32 + 1);
                let label = format!("{} {}@{}", attempt_plan.kind(), attempt_plan.id, path);
                let compiler = self.clone();
                let attempt_plan = attempt_plan.clone();
                let build_path = path.clone();
                let span = span.clone();
                PendingAttempt::new(path, label, move || {
                    let _enter = span.enter();
                    compiler.build_step(&attempt_plan, &build_path)
                })
            })
            .collect();

        Ok(Box::new(RetryStep::new(pending)))
    }
}

fn timeout_duration(plan: &Plan, timeout: &TimeoutPlan) -> EngineResult<Duration> {
    parse_duration(&timeout.duration).map_err(|reason| EngineError::InvalidDuration {
        id: plan.id.clone(),
        value: timeout.duration.clone(),
        reason,
    })
}
