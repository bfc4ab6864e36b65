// Leaf Factory
// The boundary where concrete work units (task, get, put) are constructed

use crate::execution::events::StepDelegate;
use crate::metadata::{BuildRef, ContainerMetadata};
use crate::plan::{GetPlan, PutPlan, TaskPlan};
use crate::step::BoxedStep;

use tracing::Span;

/// Builds leaf steps. The compiler knows nothing about how they execute.
///
/// Each constructor receives the span the step should log under, its plan,
/// the build it belongs to, the container metadata derived from
/// `(kind, name, attempts)`, and a delegate for reporting events.
pub trait LeafFactory: Send + Sync {
    fn task(
        &self,
        span: Span,
        plan: &TaskPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep;

    fn get(
        &self,
        span: Span,
        plan: &GetPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep;

    fn put(
        &self,
        span: Span,
        plan: &PutPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep;
}
