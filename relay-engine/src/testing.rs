// Test Kit
// Scripted fake steps and a recording leaf factory for exercising combinators

use crate::execution::events::StepDelegate;
use crate::factory::LeafFactory;
use crate::metadata::{BuildRef, ContainerMetadata};
use crate::plan::{GetPlan, Plan, PlanStep, PutPlan, TaskPlan};
use crate::step::{BoxedStep, Disposition, Signals, Step, StepDescription};
use crate::utils::parse_duration;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Span;

/// What a fake step does when run.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Succeed,
    Fail,
    Abort,
    Error,
    Panic,
    /// Sleep, then succeed; returns `Aborted` if cancelled first.
    Sleep(Duration),
}

impl Behavior {
    /// `None` => succeed, otherwise `fail`, `abort`, `error` or `sleep <duration>`.
    pub fn from_script(script: Option<&str>) -> Self {
        match script.map(str::trim) {
            None | Some("succeed") => Behavior::Succeed,
            Some("fail") => Behavior::Fail,
            Some("abort") => Behavior::Abort,
            Some("error") => Behavior::Error,
            Some("panic") => Behavior::Panic,
            Some(other) => match other.strip_prefix("sleep ") {
                Some(duration) => Behavior::Sleep(parse_duration(duration).unwrap()),
                None => panic!("unknown fake behavior '{}'", other),
            },
        }
    }
}

/// Shared, ordered log of what fakes were built and ran.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn started(&self) -> Vec<String> {
        self.with_prefix("start:")
    }

    pub fn built(&self) -> Vec<String> {
        self.with_prefix("built:")
    }
}

pub struct FakeStep {
    name: String,
    behavior: Behavior,
    recorder: Recorder,
}

impl FakeStep {
    pub fn new(name: impl Into<String>, behavior: Behavior, recorder: &Recorder) -> Self {
        Self {
            name: name.into(),
            behavior,
            recorder: recorder.clone(),
        }
    }

    pub fn boxed(name: impl Into<String>, behavior: Behavior, recorder: &Recorder) -> BoxedStep {
        Box::new(Self::new(name, behavior, recorder))
    }
}

#[async_trait::async_trait]
impl Step for FakeStep {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        self.recorder.record(format!("start:{}", self.name));
        let disposition = match self.behavior {
            Behavior::Succeed => Disposition::Succeeded,
            Behavior::Fail => Disposition::Failed,
            Behavior::Abort => Disposition::Aborted,
            Behavior::Error => Disposition::Errored(format!("{} could not run", self.name)),
            Behavior::Panic => panic!("{} crashed", self.name),
            Behavior::Sleep(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => Disposition::Succeeded,
                    _ = signals.aborted() => Disposition::Aborted,
                }
            }
        };
        self.recorder
            .record(format!("end:{}:{}", self.name, disposition));
        disposition
    }

    fn describe(&self) -> StepDescription {
        StepDescription::leaf(format!("fake:{}", self.name))
    }
}

/// Leaf factory producing [`FakeStep`]s whose behavior comes from the plan's
/// `script` field.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    pub recorder: Recorder,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn leaf(&self, metadata: &ContainerMetadata, script: Option<&str>) -> BoxedStep {
        self.recorder.record(format!("built:{}", metadata));
        Box::new(LabelledFake {
            label: metadata.to_string(),
            inner: FakeStep::new(
                metadata.step_name.clone(),
                Behavior::from_script(script),
                &self.recorder,
            ),
        })
    }
}

struct LabelledFake {
    label: String,
    inner: FakeStep,
}

#[async_trait::async_trait]
impl Step for LabelledFake {
    async fn run(self: Box<Self>, signals: Signals) -> Disposition {
        Box::new(self.inner).run(signals).await
    }

    fn describe(&self) -> StepDescription {
        StepDescription::leaf(self.label.clone())
    }
}

impl LeafFactory for RecordingFactory {
    fn task(
        &self,
        _span: Span,
        plan: &TaskPlan,
        _build: &BuildRef,
        metadata: ContainerMetadata,
        _delegate: StepDelegate,
    ) -> BoxedStep {
        self.leaf(&metadata, plan.script.as_deref())
    }

    fn get(
        &self,
        _span: Span,
        plan: &GetPlan,
        _build: &BuildRef,
        metadata: ContainerMetadata,
        _delegate: StepDelegate,
    ) -> BoxedStep {
        self.leaf(&metadata, plan.script.as_deref())
    }

    fn put(
        &self,
        _span: Span,
        plan: &PutPlan,
        _build: &BuildRef,
        metadata: ContainerMetadata,
        _delegate: StepDelegate,
    ) -> BoxedStep {
        self.leaf(&metadata, plan.script.as_deref())
    }
}

/// A task plan node whose fake behavior is given by `script`.
pub fn task(id: &str, name: &str, script: Option<&str>) -> Plan {
    Plan::new(
        id,
        PlanStep::Task(TaskPlan {
            name: name.to_string(),
            script: script.map(str::to_string),
            env: BTreeMap::new(),
        }),
    )
}
