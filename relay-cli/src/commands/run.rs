use crate::commands::load_plan;
use crate::output;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;
use tracing::debug;

use relay_engine::utils::parse_duration;
use relay_engine::{
    progress_channel, BuildExecutor, BuildRef, Disposition, ExecutionEvent, ExecutorConfig,
    LogLevel, PlanCompiler, ShellConfig, ShellLeafFactory,
};

/// Run a build plan locally
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the plan document (YAML or JSON)
    pub plan: PathBuf,

    /// Build number exported to every step
    #[arg(long, env = "RELAY_BUILD_ID", default_value_t = 1)]
    pub build_id: u64,

    /// Pipeline the build belongs to
    #[arg(long, value_name = "NAME")]
    pub pipeline: Option<String>,

    /// Job the build belongs to
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Deadline for the whole build (e.g. 30s, 10m, 1h30m)
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Working directory for every step
    #[arg(long, short = 'w', value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Set a variable (can be repeated, format: name=value)
    #[arg(long = "var", short = 'v', value_name = "NAME=VALUE")]
    pub variables: Vec<String>,

    /// Shell scripts run with, invoked as `<PROGRAM> -c <script>` (default: sh)
    #[arg(long, value_name = "PROGRAM")]
    pub shell: Option<String>,
}

fn parse_variables(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut variables = BTreeMap::new();
    for var_str in raw {
        match var_str.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                variables.insert(name.to_string(), value.to_string());
            }
            _ => color_eyre::eyre::bail!(
                "Invalid variable format '{}'. Expected name=value",
                var_str
            ),
        }
    }
    Ok(variables)
}

pub async fn execute(args: RunArgs) -> Result<()> {
    output::status("Loading", &format!("{}", args.plan.display()));
    let plan = load_plan(&args.plan)?;
    PlanCompiler::validate(&plan).map_err(|e| color_eyre::eyre::eyre!("Invalid plan: {}", e))?;

    let variables = parse_variables(&args.variables)?;

    let mut config = ExecutorConfig::default();
    if let Some(timeout) = &args.timeout {
        let duration = parse_duration(timeout)
            .map_err(|reason| color_eyre::eyre::eyre!("Invalid --timeout '{}': {}", timeout, reason))?;
        config = config.with_build_timeout(duration);
    }

    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let mut build = BuildRef::new(args.build_id);
    if let Some(pipeline) = &args.pipeline {
        build = build.with_pipeline(pipeline.clone());
    }
    if let Some(job) = &args.job {
        build = build.with_job(job.clone());
    }

    let factory = ShellLeafFactory::new(ShellConfig {
        working_dir,
        env: variables,
        program: args.shell.clone(),
    });

    let (tx, mut rx) = progress_channel();
    let executor = BuildExecutor::new(Arc::new(factory), build)
        .with_config(config)
        .with_progress(tx);

    // First Ctrl-C aborts and lets cleanup hooks run, a second one stops them
    let abort = executor.abort_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    debug!(build_id = args.build_id, "starting build");
    let mut exec_handle = tokio::spawn(async move { executor.execute(&plan).await });

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => print_event(&event),
            joined = &mut exec_handle => {
                break joined?.map_err(|e| color_eyre::eyre::eyre!("Build failed to start: {}", e))?;
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(&event);
    }

    match result.disposition {
        Disposition::Succeeded => Ok(()),
        Disposition::Aborted => std::process::exit(130),
        _ => std::process::exit(1),
    }
}

fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::BuildStarted {
            build_id,
            total_plans,
        } => output::build_header(*build_id, *total_plans),

        ExecutionEvent::BuildAborting { build_id } => {
            output::warning(&format!("Aborting build #{}, waiting for cleanup", build_id));
        }

        ExecutionEvent::StepStarted { plan_id, metadata } => output::step_started(plan_id, metadata),

        ExecutionEvent::StepOutput {
            output: text,
            is_error,
            ..
        } => {
            for line in text.lines() {
                output::step_output(line, *is_error);
            }
        }

        ExecutionEvent::StepCompleted {
            disposition,
            duration,
            ..
        } => output::step_finished(disposition, *duration),

        ExecutionEvent::Log { level, message, .. } => match level {
            LogLevel::Info => output::info(message),
            LogLevel::Warning => output::warning(message),
            LogLevel::Error => output::error(message),
        },

        ExecutionEvent::BuildCompleted {
            disposition,
            duration,
            ..
        } => output::build_finished(disposition, *duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = parse_variables(&["A=1".to_string(), "B=x=y".to_string()]).unwrap();
        assert_eq!(vars.get("A"), Some(&"1".to_string()));
        assert_eq!(vars.get("B"), Some(&"x=y".to_string()));
    }

    #[test]
    fn test_parse_variables_rejects_missing_name() {
        assert!(parse_variables(&["novalue".to_string()]).is_err());
        assert!(parse_variables(&["=1".to_string()]).is_err());
    }
}
