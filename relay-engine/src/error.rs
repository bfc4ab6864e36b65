// Engine Errors
// Construction-time failures raised before any step of a build runs

use crate::plan::PlanId;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort plan parsing or compilation.
///
/// Step outcomes (failure, abort, erred) are never errors; they are reported
/// as a [`Disposition`](crate::step::Disposition) once the build is running.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("plan {id}: unknown step kind '{kind}'")]
    UnknownPlanKind { id: String, kind: String },

    #[error("plan {id}: no step kind given")]
    MissingPlanKind { id: String },

    #[error("plan {id}: expected exactly one step kind, found {}", kinds.join(", "))]
    AmbiguousPlanKind { id: String, kinds: Vec<String> },

    #[error("plan {id}: invalid duration '{value}': {reason}")]
    InvalidDuration {
        id: PlanId,
        value: String,
        reason: String,
    },

    #[error("plan {id}: retry needs at least one attempt")]
    EmptyRetry { id: PlanId },

    #[error("invalid plan document: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}
