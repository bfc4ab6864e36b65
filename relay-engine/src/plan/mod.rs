// Build Plan Module
// Plan data models and the plan document parser

pub mod models;
pub mod parser;

pub use models::{
    GetPlan, HookPlan, Plan, PlanId, PlanStep, PutPlan, TaskPlan, TimeoutPlan, TryPlan,
};
pub use parser::PlanParser;
