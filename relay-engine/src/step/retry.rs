// Retry Step
// Runs freshly built attempts in order until one succeeds

use super::{BoxedStep, Disposition, Signals, Step, StepDescription};
use crate::attempts::Attempts;
use crate::error::EngineResult;

use tracing::{debug, info, warn};

type BuildAttempt = Box<dyn FnOnce() -> EngineResult<BoxedStep> + Send>;

/// An attempt that has not been built yet.
pub struct PendingAttempt {
    attempts: Attempts,
    label: String,
    build: BuildAttempt,
}

impl PendingAttempt {
    pub fn new<F>(attempts: Attempts, label: impl Into<String>, build: F) -> Self
    where
        F: FnOnce() -> EngineResult<BoxedStep> + Send + 'static,
    {
        Self {
            attempts,
            label: label.into(),
            build: Box::new(build),
        }
    }
}

/// Retries failed attempts; each attempt is built right before it runs, so no
/// state carries over from one attempt to the next and attempts after the
/// first success are never built.
///
/// Aborts stop the loop at once. Failures, timeouts and erred attempts are
/// retried; when every attempt is used up the last attempt's disposition is
/// reported.
pub struct RetryStep {
    attempts: Vec<PendingAttempt>,
}

impl RetryStep {
    pub fn new(attempts: Vec<PendingAttempt>) -> Self {
        Self { attempts }
    }
}

#[async_trait::async_trait]
impl Step for RetryStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        let total = self.attempts.len();
        let mut last = Disposition::Errored("retry has no attempts".to_string());

        for pending in self.attempts {
            if signals.is_aborted() {
                return Disposition::Aborted;
            }

            let step = match (pending.build)() {
                Ok(step) => step,
                Err(err) => {
                    warn!(attempt = %pending.attempts, error = %err, "could not build attempt");
                    return Disposition::Errored(err.to_string());
                }
            };

            debug!(attempt = %pending.attempts, total, "running attempt");
            let outcome = step.run(signals.clone()).await;
            if outcome.succeeded() || outcome.is_aborted() {
                return outcome;
            }

            info!(attempt = %pending.attempts, total, result = %outcome, "attempt did not succeed");
            last = outcome;
        }

        last
    }

    fn describe(&self) -> StepDescription {
        StepDescription::node(
            "retry",
            self.attempts
                .iter()
                .map(|pending| StepDescription::leaf(format!("{} (pending)", pending.label)))
                .collect(),
        )
    }
}
