use super::{Disposition, Signals, Step, StepDescription};

/// Always succeeds without doing anything. Seeds the fold that builds `do`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityStep;

#[async_trait::async_trait]
impl Step for IdentityStep {
    async fn run(self: Box<Self>, _signals: Signals) -> Disposition {
        Disposition::Succeeded
    }

    fn describe(&self) -> StepDescription {
        StepDescription::leaf("identity")
    }
}
