// Build Executor
// Compiles a build plan and drives the resulting step tree to completion

use crate::error::EngineResult;
use crate::compiler::PlanCompiler;
use crate::execution::events::{BuildDelegate, EventSender, ExecutionEvent, ProgressSender};
use crate::factory::LeafFactory;
use crate::metadata::BuildRef;
use crate::plan::Plan;
use crate::step::{BoxedStep, Disposition, Signals, StepDescription, TimeoutStep};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};

/// Result of running a build
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub build_id: u64,
    /// Disposition of the root step
    pub disposition: Disposition,
    /// Total duration
    pub duration: Duration,
}

impl BuildResult {
    pub fn succeeded(&self) -> bool {
        self.disposition.succeeded()
    }
}

/// Configuration for build execution
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Deadline for the whole build (None = no deadline)
    pub build_timeout: Option<Duration>,
}

impl ExecutorConfig {
    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = Some(timeout);
        self
    }
}

/// Requests cancellation of a running build.
///
/// The first abort lets cleanup hooks finish; a second one stops them too.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    build_id: u64,
    signals: Signals,
    event_tx: Option<ProgressSender>,
}

impl AbortHandle {
    pub fn abort(&self) {
        if self.signals.is_killed() {
            return;
        }
        if self.signals.is_aborted() {
            warn!(build_id = self.build_id, "aborting build again, stopping cleanup");
            self.event_tx.send_event(ExecutionEvent::warning(
                "abort repeated, cleanup steps are being stopped",
                None,
            ));
            self.signals.kill();
            return;
        }
        info!(build_id = self.build_id, "aborting build");
        self.event_tx.send_event(ExecutionEvent::BuildAborting {
            build_id: self.build_id,
        });
        self.signals.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.signals.is_aborted()
    }
}

/// Runs one build. Each executor owns the abort signal of its build.
pub struct BuildExecutor {
    factory: Arc<dyn LeafFactory>,
    build: BuildRef,
    config: ExecutorConfig,
    event_tx: Option<ProgressSender>,
    signals: Signals,
}

impl BuildExecutor {
    pub fn new(factory: Arc<dyn LeafFactory>, build: BuildRef) -> Self {
        Self {
            factory,
            build,
            config: ExecutorConfig::default(),
            event_tx: None,
            signals: Signals::new(),
        }
    }

    /// Set executor configuration
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            build_id: self.build.build_id,
            signals: self.signals.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    fn compiler(&self) -> PlanCompiler {
        let delegate = match &self.event_tx {
            Some(tx) => BuildDelegate::new(tx.clone()),
            None => BuildDelegate::silent(),
        };
        PlanCompiler::new(self.factory.clone(), self.build.clone()).with_delegate(delegate)
    }

    /// Compile `plan` without running it
    pub fn compile(&self, plan: &Plan) -> EngineResult<BoxedStep> {
        let root = self.compiler().compile(plan)?;
        Ok(match self.config.build_timeout {
            Some(timeout) => Box::new(TimeoutStep::new(root, timeout)),
            None => root,
        })
    }

    /// Shape of the step tree `plan` compiles to
    pub fn describe(&self, plan: &Plan) -> EngineResult<StepDescription> {
        Ok(self.compile(plan)?.describe())
    }

    /// Compile and run the plan. Construction errors are returned before any
    /// step starts; everything after that is reported in the disposition.
    pub async fn execute(&self, plan: &Plan) -> EngineResult<BuildResult> {
        let build_id = self.build.build_id;
        let root = self.compile(plan)?;

        let start = Instant::now();
        self.event_tx
            .send_event(ExecutionEvent::build_started(build_id, plan.node_count()));
        if let Some(timeout) = self.config.build_timeout {
            self.event_tx.send_event(ExecutionEvent::info(
                format!("build must finish within {:?}", timeout),
                None,
            ));
        }

        let disposition = root
            .run(self.signals.clone())
            .instrument(info_span!("build", build_id))
            .await;

        let duration = start.elapsed();
        info!(build_id, result = %disposition, ?duration, "build finished");
        self.event_tx.send_event(ExecutionEvent::build_completed(
            build_id,
            disposition.clone(),
            duration,
        ));

        Ok(BuildResult {
            build_id,
            disposition,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::events::{progress_channel, LogLevel};
    use crate::plan::PlanParser;
    use crate::testing::RecordingFactory;

    fn executor() -> (BuildExecutor, RecordingFactory) {
        let factory = RecordingFactory::new();
        let executor = BuildExecutor::new(Arc::new(factory.clone()), BuildRef::new(11));
        (executor, factory)
    }

    #[tokio::test]
    async fn test_execute_reports_build_events() {
        let (executor, factory) = executor();
        let (tx, mut rx) = progress_channel();
        let executor = executor.with_progress(tx);

        let plan = PlanParser::from_str(
            "id: 1\ndo:\n  - { id: 2, task: { name: a } }\n  - { id: 3, task: { name: b } }\n",
        )
        .unwrap();

        let result = executor.execute(&plan).await.unwrap();
        assert!(result.succeeded());
        assert_eq!(result.build_id, 11);
        assert_eq!(factory.recorder.started(), vec!["a", "b"]);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            ExecutionEvent::BuildStarted {
                build_id: 11,
                total_plans: 3
            }
        ));
        let last = rx.recv().await.unwrap();
        assert!(matches!(
            last,
            ExecutionEvent::BuildCompleted {
                disposition: Disposition::Succeeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_construction_error_runs_nothing() {
        let (executor, factory) = executor();
        let plan = PlanParser::from_str(
            "id: 1\ndo:\n  - { id: 2, task: { name: a } }\n  - { id: 3, timeout: { duration: forever, step: { id: 4, task: { name: b } } } }\n",
        )
        .unwrap();

        assert!(executor.execute(&plan).await.is_err());
        assert!(factory.recorder.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_unwinds_build_but_runs_ensure() {
        let (executor, factory) = executor();
        let plan = PlanParser::from_str(
            r#"
id: 1
ensure:
  step:
    id: 2
    do:
      - { id: 3, task: { name: long, script: sleep 1h } }
      - { id: 4, task: { name: never } }
  next: { id: 5, task: { name: cleanup } }
"#,
        )
        .unwrap();

        let handle = executor.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.abort();
        });

        let result = executor.execute(&plan).await.unwrap();
        assert_eq!(result.disposition, Disposition::Aborted);
        assert_eq!(factory.recorder.started(), vec!["long", "cleanup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_timeout_wraps_root() {
        let (executor, _) = executor();
        let executor =
            executor.with_config(ExecutorConfig::default().with_build_timeout(Duration::from_secs(5)));
        let plan =
            PlanParser::from_str("id: 1\ntask: { name: hang, script: sleep 1h }\n").unwrap();

        let result = executor.execute(&plan).await.unwrap();
        assert_eq!(result.disposition, Disposition::TimedOut(Duration::from_secs(5)));
        assert_eq!(executor.describe(&plan).unwrap().label, "timeout 5s");
    }

    const HUNG_CLEANUP: &str = r#"
id: 1
ensure:
  step: { id: 2, task: { name: long, script: sleep 1h } }
  next: { id: 3, task: { name: cleanup, script: sleep 1h } }
"#;

    #[tokio::test(start_paused = true)]
    async fn test_second_abort_stops_hung_cleanup() {
        let (executor, factory) = executor();
        let (tx, mut rx) = progress_channel();
        let executor = executor.with_progress(tx);
        let plan = PlanParser::from_str(HUNG_CLEANUP).unwrap();

        let handle = executor.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.abort();
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.abort();
        });

        let start = tokio::time::Instant::now();
        let result = executor.execute(&plan).await.unwrap();
        assert_eq!(result.disposition, Disposition::Aborted);
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(factory
            .recorder
            .entries()
            .contains(&"end:cleanup:aborted".to_string()));

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::Log {
                level: LogLevel::Warning,
                ..
            } = event
            {
                warned = true;
            }
        }
        assert!(warned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_timeout_stops_hung_cleanup() {
        let (executor, _) = executor();
        let executor =
            executor.with_config(ExecutorConfig::default().with_build_timeout(Duration::from_secs(5)));
        let plan = PlanParser::from_str(HUNG_CLEANUP).unwrap();

        let start = tokio::time::Instant::now();
        let result = executor.execute(&plan).await.unwrap();
        assert_eq!(result.disposition, Disposition::TimedOut(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
