use super::{BoxedStep, Disposition, Signals, Step, StepDescription};

use tracing::debug;

/// Best-effort wrapper: swallows failure and errors, forwards aborts.
pub struct TryStep {
    step: BoxedStep,
}

impl TryStep {
    pub fn new(step: BoxedStep) -> Self {
        Self { step }
    }
}

#[async_trait::async_trait]
impl Step for TryStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        match self.step.run(signals).await {
            Disposition::Aborted => Disposition::Aborted,
            Disposition::Succeeded => Disposition::Succeeded,
            other => {
                debug!(result = %other, "ignoring outcome of try");
                Disposition::Succeeded
            }
        }
    }

    fn describe(&self) -> StepDescription {
        StepDescription::node("try", vec![self.step.describe()])
    }
}
