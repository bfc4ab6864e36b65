// Relay Engine Library
// Compiles build plans into step trees and runs them

pub mod attempts;
pub mod compiler;
pub mod error;
pub mod execution;
pub mod factory;
pub mod metadata;
pub mod plan;
pub mod runners;
pub mod step;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use error::{EngineError, EngineResult};

pub use attempts::Attempts;
pub use compiler::PlanCompiler;
pub use factory::LeafFactory;
pub use metadata::{BuildRef, ContainerKind, ContainerMetadata};

// Re-export plan types
pub use plan::{
    GetPlan, HookPlan, Plan, PlanId, PlanParser, PlanStep, PutPlan, TaskPlan, TimeoutPlan, TryPlan,
};

// Re-export step types
pub use step::{BoxedStep, Disposition, Signals, Step, StepDescription};

// Re-export execution types
pub use execution::{
    progress_channel, AbortHandle, BuildDelegate, BuildExecutor, BuildResult, EventSender,
    ExecutionEvent, ExecutorConfig, LogLevel, ProgressReceiver, ProgressSender, StepDelegate,
};

// Re-export runner types
pub use runners::{ShellConfig, ShellLeafFactory};
