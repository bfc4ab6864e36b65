// Shell Runner
// Leaf factory that runs task, get and put steps as local shell scripts

use crate::execution::events::StepDelegate;
use crate::factory::LeafFactory;
use crate::metadata::{BuildRef, ContainerMetadata};
use crate::plan::{GetPlan, PutPlan, TaskPlan};
use crate::step::{BoxedStep, Disposition, Signals, Step, StepDescription};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument, Span};

/// Shell executable and arguments for a script
fn shell_command(program: Option<&str>) -> (&str, &'static [&'static str]) {
    match program {
        Some(program) => (program, &["-c"]),
        None if cfg!(target_os = "windows") => ("cmd", &["/C"]),
        None => ("sh", &["-c"]),
    }
}

/// Configuration for shell execution
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory for every script
    pub working_dir: PathBuf,
    /// Environment added to every script
    pub env: BTreeMap<String, String>,
    /// Shell taking `-c <script>` (None = sh, or cmd on Windows)
    pub program: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env: BTreeMap::new(),
            program: None,
        }
    }
}

/// Builds [`ShellStep`]s. A leaf without a script succeeds without running
/// anything.
#[derive(Debug, Clone, Default)]
pub struct ShellLeafFactory {
    config: ShellConfig,
}

impl ShellLeafFactory {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    fn step(
        &self,
        span: Span,
        script: Option<&str>,
        mut env: BTreeMap<String, String>,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep {
        env.extend(build.env());
        env.insert("STEP_NAME".to_string(), metadata.step_name.clone());
        env.insert("STEP_KIND".to_string(), metadata.kind.to_string());
        env.insert("STEP_ATTEMPT".to_string(), metadata.attempts.to_string());

        Box::new(ShellStep {
            span,
            script: script.map(str::to_string),
            env,
            metadata,
            delegate,
            config: self.config.clone(),
        })
    }
}

impl LeafFactory for ShellLeafFactory {
    fn task(
        &self,
        span: Span,
        plan: &TaskPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep {
        self.step(span, plan.script.as_deref(), plan.env.clone(), build, metadata, delegate)
    }

    fn get(
        &self,
        span: Span,
        plan: &GetPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep {
        let mut env = params_env(&plan.params);
        env.insert("RESOURCE_NAME".to_string(), plan.resource().to_string());
        for (key, value) in &plan.version {
            env.insert(format!("VERSION_{}", env_key(key)), value.clone());
        }
        self.step(span, plan.script.as_deref(), env, build, metadata, delegate)
    }

    fn put(
        &self,
        span: Span,
        plan: &PutPlan,
        build: &BuildRef,
        metadata: ContainerMetadata,
        delegate: StepDelegate,
    ) -> BoxedStep {
        let mut env = params_env(&plan.params);
        env.insert("RESOURCE_NAME".to_string(), plan.resource().to_string());
        self.step(span, plan.script.as_deref(), env, build, metadata, delegate)
    }
}

fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn params_env(params: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    params
        .iter()
        .map(|(key, value)| (format!("PARAM_{}", env_key(key)), value.clone()))
        .collect()
}

/// A leaf step backed by a child shell process
pub struct ShellStep {
    span: Span,
    script: Option<String>,
    env: BTreeMap<String, String>,
    metadata: ContainerMetadata,
    delegate: StepDelegate,
    config: ShellConfig,
}

#[async_trait::async_trait]
impl Step for ShellStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        let span = self.span.clone();
        self.execute(signals).instrument(span).await
    }

    fn describe(&self) -> StepDescription {
        StepDescription::leaf(self.metadata.to_string())
    }
}

impl ShellStep {
    async fn execute(self, signals: Signals) -> Disposition {
        let start = Instant::now();
        self.delegate.started(&self.metadata);

        let disposition = match &self.script {
            Some(script) => self.run_script(script, &signals).await,
            None => {
                debug!("no script, nothing to run");
                Disposition::Succeeded
            }
        };

        self.delegate
            .finished(&self.metadata, &disposition, start.elapsed());
        disposition
    }

    async fn run_script(&self, script: &str, signals: &Signals) -> Disposition {
        if signals.is_aborted() {
            return Disposition::Aborted;
        }

        let (program, shell_args) = shell_command(self.config.program.as_deref());

        let mut cmd = Command::new(program);
        cmd.args(shell_args);
        cmd.arg(script);
        cmd.current_dir(&self.config.working_dir);
        cmd.envs(&self.config.env);
        cmd.envs(&self.env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to spawn shell process '{}': {}", program, e);
                warn!(error = %e, program, "could not start step");
                self.delegate.errored(message.clone());
                return Disposition::Errored(message);
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return Disposition::Errored("process output was not captured".to_string());
        };

        let stdout_handle = forward_lines(stdout, self.delegate.clone(), false);
        let stderr_handle = forward_lines(stderr, self.delegate.clone(), true);

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = signals.aborted() => None,
        };

        let Some(status) = waited else {
            info!("abort requested, stopping process");
            let _ = child.kill().await;
            // grandchildren may still hold the pipes open
            stdout_handle.abort();
            stderr_handle.abort();
            return Disposition::Aborted;
        };

        let _ = stdout_handle.await;
        let _ = stderr_handle.await;

        match status {
            Ok(status) if status.success() => Disposition::Succeeded,
            Ok(status) => {
                info!(exit_code = ?status.code(), "script failed");
                Disposition::Failed
            }
            Err(e) => {
                self.delegate.errored(format!("process error: {}", e));
                Disposition::Errored(format!("process error: {}", e))
            }
        }
    }
}

/// Stream lines from a process pipe to the step delegate. Reads until EOF;
/// bytes that are not UTF-8 are replaced rather than ending the stream.
fn forward_lines<R>(reader: R, delegate: StepDelegate, is_error: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    delegate.output(line.trim_end_matches(['\n', '\r']), is_error);
                }
                Err(e) => {
                    debug!(error = %e, "stopped reading process output");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempts::Attempts;
    use crate::execution::events::{progress_channel, BuildDelegate, ExecutionEvent};
    use crate::metadata::ContainerKind;
    use crate::plan::PlanId;

    use std::time::Duration;

    fn task(name: &str, script: &str) -> TaskPlan {
        TaskPlan {
            name: name.to_string(),
            script: Some(script.to_string()),
            env: BTreeMap::new(),
        }
    }

    fn build_task(
        factory: &ShellLeafFactory,
        plan: &TaskPlan,
        attempts: &Attempts,
        delegate: StepDelegate,
    ) -> BoxedStep {
        factory.task(
            Span::none(),
            plan,
            &BuildRef::new(5).with_pipeline("ci"),
            ContainerMetadata::new(ContainerKind::Task, &plan.name, attempts),
            delegate,
        )
    }

    fn silent() -> StepDelegate {
        BuildDelegate::silent().step_delegate(&PlanId::new("1"))
    }

    #[tokio::test]
    async fn test_shell_step_echo() {
        let (tx, mut rx) = progress_channel();
        let delegate = BuildDelegate::new(tx).step_delegate(&PlanId::new("7"));
        let factory = ShellLeafFactory::default();

        let step = build_task(&factory, &task("hello", "echo Hello"), &Attempts::root(), delegate);
        assert_eq!(step.run(Signals::new()).await, Disposition::Succeeded);

        let mut outputs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::StepOutput { output, .. } = event {
                outputs.push(output);
            }
        }
        assert_eq!(outputs, vec!["Hello"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_step_exports_metadata() {
        let (tx, mut rx) = progress_channel();
        let delegate = BuildDelegate::new(tx).step_delegate(&PlanId::new("7"));
        let factory = ShellLeafFactory::default();
        let plan = task("unit", "echo $STEP_NAME $STEP_ATTEMPT $BUILD_ID $BUILD_PIPELINE_NAME");

        let step = build_task(&factory, &plan, &Attempts::from(vec![2, 1]), delegate);
        assert_eq!(step.run(Signals::new()).await, Disposition::Succeeded);

        let mut outputs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::StepOutput { output, .. } = event {
                outputs.push(output);
            }
        }
        assert_eq!(outputs, vec!["unit 2.1 5 ci"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_output_keeps_streaming() {
        let (tx, mut rx) = progress_channel();
        let delegate = BuildDelegate::new(tx).step_delegate(&PlanId::new("7"));
        let factory = ShellLeafFactory::default();
        let plan = task("bytes", "printf '\\377\\n'; sleep 0.3; echo done; exit 0");

        let step = build_task(&factory, &plan, &Attempts::root(), delegate);
        assert_eq!(step.run(Signals::new()).await, Disposition::Succeeded);

        let mut outputs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::StepOutput { output, .. } = event {
                outputs.push(output);
            }
        }
        assert_eq!(outputs, vec!["\u{FFFD}", "done"]);
    }

    #[tokio::test]
    async fn test_shell_step_exit_code_is_failure() {
        let factory = ShellLeafFactory::default();
        let step = build_task(&factory, &task("bad", "exit 3"), &Attempts::root(), silent());
        assert_eq!(step.run(Signals::new()).await, Disposition::Failed);
    }

    #[tokio::test]
    async fn test_missing_shell_is_errored() {
        let factory = ShellLeafFactory::new(ShellConfig {
            program: Some("definitely-not-a-shell-program".to_string()),
            ..ShellConfig::default()
        });
        let step = build_task(&factory, &task("x", "true"), &Attempts::root(), silent());
        assert!(step.run(Signals::new()).await.is_errored());
    }

    #[tokio::test]
    async fn test_leaf_without_script_succeeds() {
        let factory = ShellLeafFactory::default();
        let plan = TaskPlan {
            name: "noop".to_string(),
            script: None,
            env: BTreeMap::new(),
        };
        let step = build_task(&factory, &plan, &Attempts::root(), silent());
        assert_eq!(step.run(Signals::new()).await, Disposition::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abort_stops_process() {
        let factory = ShellLeafFactory::default();
        let step = build_task(&factory, &task("slow", "sleep 30"), &Attempts::root(), silent());

        let signals = Signals::new();
        let abort = signals.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            abort.abort();
        });

        let start = std::time::Instant::now();
        assert_eq!(step.run(signals).await, Disposition::Aborted);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_params_env_keys() {
        let mut params = BTreeMap::new();
        params.insert("tag-file".to_string(), "out/tag".to_string());
        let env = params_env(&params);
        assert_eq!(env.get("PARAM_TAG_FILE"), Some(&"out/tag".to_string()));
    }
}
