// Execution Module
// Build driver, progress events and per-step event delegates

pub mod events;
pub mod executor;

// Re-export key types
pub use events::{
    progress_channel, BuildDelegate, EventSender, ExecutionEvent, LogLevel, ProgressReceiver,
    ProgressSender, StepDelegate,
};
pub use executor::{AbortHandle, BuildExecutor, BuildResult, ExecutorConfig};
