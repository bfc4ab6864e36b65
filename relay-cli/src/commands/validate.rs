use crate::commands::load_plan;
use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use color_eyre::Result;

use relay_engine::{BuildExecutor, BuildRef, PlanCompiler, ShellLeafFactory};

/// Output format for the compiled step tree
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

/// Validate a build plan
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the plan document (YAML or JSON)
    pub plan: PathBuf,

    /// Print the step tree as structured data instead of an outline
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    output::status("Validating", &format!("{}", args.plan.display()));

    let plan = match load_plan(&args.plan) {
        Ok(plan) => plan,
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    };
    output::check("Plan syntax valid");

    if let Err(e) = PlanCompiler::validate(&plan) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
    output::check(&format!("{} plans compile", plan.node_count()));

    let executor = BuildExecutor::new(Arc::new(ShellLeafFactory::default()), BuildRef::new(0));
    let description = executor
        .describe(&plan)
        .map_err(|e| color_eyre::eyre::eyre!("Compile error: {}", e))?;

    match args.format {
        Some(Format::Json) => println!("{}", serde_json::to_string_pretty(&description)?),
        Some(Format::Yaml) => print!("{}", serde_yaml::to_string(&description)?),
        None => print!("{}", description.render()),
    }

    Ok(())
}
