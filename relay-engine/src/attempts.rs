// Attempts Path
// Identifies which retry branch(es) produced a step

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, 1-based retry attempt indices from the outermost retry inward.
///
/// Empty at the root of a build. Only `retry` extends it; every other
/// combinator hands its own path to its children unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attempts(Vec<u32>);

impl Attempts {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path for attempt `index` of a retry nested under `self`.
    pub fn child(&self, index: u32) -> Self {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.extend_from_slice(&self.0);
        path.push(index);
        Self(path)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for Attempts {
    fn from(path: Vec<u32>) -> Self {
        Self(path)
    }
}

impl fmt::Display for Attempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}
