// Execution Events
// Progress reporting and per-step event delegates for running builds

use crate::metadata::ContainerMetadata;
use crate::plan::PlanId;
use crate::step::Disposition;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while a build runs
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Build started running its compiled plan
    BuildStarted { build_id: u64, total_plans: usize },

    /// Build finished
    BuildCompleted {
        build_id: u64,
        disposition: Disposition,
        duration: Duration,
    },

    /// Abort was requested for the build
    BuildAborting { build_id: u64 },

    /// A leaf step started
    StepStarted {
        plan_id: PlanId,
        metadata: ContainerMetadata,
    },

    /// Output from a leaf step
    StepOutput {
        plan_id: PlanId,
        output: String,
        is_error: bool,
    },

    /// A leaf step reached a terminal disposition
    StepCompleted {
        plan_id: PlanId,
        metadata: ContainerMetadata,
        disposition: Disposition,
        duration: Duration,
    },

    /// Log message
    Log {
        level: LogLevel,
        message: String,
        plan_id: Option<PlanId>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn build_started(build_id: u64, total_plans: usize) -> Self {
        Self::BuildStarted {
            build_id,
            total_plans,
        }
    }

    pub fn build_completed(build_id: u64, disposition: Disposition, duration: Duration) -> Self {
        Self::BuildCompleted {
            build_id,
            disposition,
            duration,
        }
    }

    pub fn info(message: impl Into<String>, plan_id: Option<PlanId>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            plan_id,
        }
    }

    pub fn warning(message: impl Into<String>, plan_id: Option<PlanId>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            plan_id,
        }
    }

    pub fn error(message: impl Into<String>, plan_id: Option<PlanId>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            plan_id,
        }
    }

    /// Plan node this event is about, if any
    pub fn plan_id(&self) -> Option<&PlanId> {
        match self {
            Self::StepStarted { plan_id, .. }
            | Self::StepOutput { plan_id, .. }
            | Self::StepCompleted { plan_id, .. } => Some(plan_id),
            Self::Log { plan_id, .. } => plan_id.as_ref(),
            _ => None,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

/// Hands out per-step delegates for one build
#[derive(Debug, Clone, Default)]
pub struct BuildDelegate {
    tx: Option<ProgressSender>,
}

impl BuildDelegate {
    pub fn new(tx: ProgressSender) -> Self {
        Self { tx: Some(tx) }
    }

    /// A delegate that drops every event
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn step_delegate(&self, plan_id: &PlanId) -> StepDelegate {
        StepDelegate {
            plan_id: plan_id.clone(),
            tx: self.tx.clone(),
        }
    }

    pub fn send(&self, event: ExecutionEvent) {
        self.tx.send_event(event);
    }
}

/// Event sink a leaf step reports through, bound to its plan id
#[derive(Debug, Clone)]
pub struct StepDelegate {
    plan_id: PlanId,
    tx: Option<ProgressSender>,
}

impl StepDelegate {
    pub fn plan_id(&self) -> &PlanId {
        &self.plan_id
    }

    pub fn started(&self, metadata: &ContainerMetadata) {
        self.tx.send_event(ExecutionEvent::StepStarted {
            plan_id: self.plan_id.clone(),
            metadata: metadata.clone(),
        });
    }

    pub fn output(&self, output: impl Into<String>, is_error: bool) {
        self.tx.send_event(ExecutionEvent::StepOutput {
            plan_id: self.plan_id.clone(),
            output: output.into(),
            is_error,
        });
    }

    pub fn finished(&self, metadata: &ContainerMetadata, disposition: &Disposition, duration: Duration) {
        self.tx.send_event(ExecutionEvent::StepCompleted {
            plan_id: self.plan_id.clone(),
            metadata: metadata.clone(),
            disposition: disposition.clone(),
            duration,
        });
    }

    pub fn errored(&self, message: impl Into<String>) {
        self.tx
            .send_event(ExecutionEvent::error(message, Some(self.plan_id.clone())));
    }
}
