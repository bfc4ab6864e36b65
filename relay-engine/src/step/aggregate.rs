// Aggregate Step
// Fans out to every child concurrently and waits for all of them

use super::{BoxedStep, Disposition, Signals, Step, StepDescription};

use tracing::{debug, warn};

/// Runs all children concurrently; succeeds iff every child succeeds.
///
/// A failing child does not stop its siblings. A child reporting an abort
/// aborts the shared group signals so the abort reaches every sibling. The
/// composite disposition is the most severe child disposition, earliest
/// declared child first on ties.
pub struct AggregateStep {
    steps: Vec<BoxedStep>,
}

impl AggregateStep {
    pub fn new(steps: Vec<BoxedStep>) -> Self {
        Self { steps }
    }
}

#[async_trait::async_trait]
impl Step for AggregateStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        let group = signals.child();

        let handles: Vec<_> = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                let group = group.clone();
                tokio::spawn(async move {
                    let outcome = step.run(group.clone()).await;
                    if outcome.is_aborted() && !group.is_aborted() {
                        debug!(child = index, "child aborted, cancelling siblings");
                        group.abort();
                    }
                    outcome
                })
            })
            .collect();

        // Awaited in declaration order so ties keep the earliest child.
        let mut composite = Disposition::Succeeded;
        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(child = index, error = %err, "aggregate child did not finish");
                    Disposition::Errored(format!("step crashed: {}", err))
                }
            };
            composite = composite.worst(outcome);
        }
        composite
    }

    fn describe(&self) -> StepDescription {
        StepDescription::node(
            "aggregate",
            self.steps.iter().map(|step| step.describe()).collect(),
        )
    }
}
