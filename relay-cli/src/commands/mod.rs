pub mod run;
pub mod validate;

use std::path::Path;

use color_eyre::Result;
use relay_engine::{Plan, PlanParser};

/// Load a plan document, failing early when the file does not exist
pub fn load_plan(path: &Path) -> Result<Plan> {
    if !path.exists() {
        color_eyre::eyre::bail!("Plan file not found: {}", path.display());
    }
    PlanParser::from_file(path).map_err(|e| color_eyre::eyre::eyre!("Parse error: {}", e))
}
