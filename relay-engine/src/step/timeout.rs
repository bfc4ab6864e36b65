// Timeout Step
// Cancels a child that has not finished by its deadline

use super::{BoxedStep, Disposition, Signals, Step, StepDescription};

use std::time::Duration;
use tracing::info;

/// Runs a child under a deadline.
///
/// When the deadline passes first, the child's signals are killed, cleanup
/// hooks below included, and the child is awaited until it unwinds; the
/// result is then [`Disposition::TimedOut`]. Otherwise the child's
/// disposition is returned unchanged.
pub struct TimeoutStep {
    step: BoxedStep,
    duration: Duration,
}

impl TimeoutStep {
    pub fn new(step: BoxedStep, duration: Duration) -> Self {
        Self { step, duration }
    }
}

#[async_trait::async_trait]
impl Step for TimeoutStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        let duration = self.duration;
        let child = signals.child();
        let mut running = self.step.run(child.clone());

        tokio::select! {
            outcome = &mut running => outcome,
            _ = tokio::time::sleep(duration) => {
                info!(?duration, "deadline reached, cancelling step");
                child.kill();
                let outcome = running.await;
                if signals.is_aborted() {
                    // the build was aborted concurrently; report that instead
                    outcome
                } else {
                    Disposition::TimedOut(duration)
                }
            }
        }
    }

    fn describe(&self) -> StepDescription {
        StepDescription::node(
            format!("timeout {:?}", self.duration),
            vec![self.step.describe()],
        )
    }
}
