// Step Metadata
// Build references and the container labels derived for each leaf step

use crate::attempts::Attempts;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which kind of leaf a container is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Task,
    Get,
    Put,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Task => "task",
            ContainerKind::Get => "get",
            ContainerKind::Put => "put",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the build a step belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    pub build_id: u64,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
}

impl BuildRef {
    pub fn new(build_id: u64) -> Self {
        Self {
            build_id,
            pipeline_name: None,
            job_name: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline_name: impl Into<String>) -> Self {
        self.pipeline_name = Some(pipeline_name.into());
        self
    }

    pub fn with_job(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }

    /// Environment a leaf can expose to the work it runs.
    pub fn env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("BUILD_ID".to_string(), self.build_id.to_string());
        if let Some(pipeline) = &self.pipeline_name {
            env.insert("BUILD_PIPELINE_NAME".to_string(), pipeline.clone());
        }
        if let Some(job) = &self.job_name {
            env.insert("BUILD_JOB_NAME".to_string(), job.clone());
        }
        env
    }
}

/// Metadata attached to the container of a leaf step.
///
/// A pure function of `(kind, step name, attempts)`: compiling the same plan
/// twice yields equal metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub kind: ContainerKind,
    pub step_name: String,
    pub attempts: Attempts,
}

impl ContainerMetadata {
    pub fn new(kind: ContainerKind, step_name: impl Into<String>, attempts: &Attempts) -> Self {
        Self {
            kind,
            step_name: step_name.into(),
            attempts: attempts.clone(),
        }
    }

    /// Labels identifying the container, sorted by key.
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert("type".to_string(), self.kind.to_string());
        labels.insert("step-name".to_string(), self.step_name.clone());
        if !self.attempts.is_root() {
            labels.insert("attempt".to_string(), self.attempts.to_string());
        }
        labels
    }
}

impl fmt::Display for ContainerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.step_name)?;
        if !self.attempts.is_root() {
            write!(f, "@{}", self.attempts)?;
        }
        Ok(())
    }
}
