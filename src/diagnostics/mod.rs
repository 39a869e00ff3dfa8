//! Diagnostics for score trees
//!
//! Checks report `Violation`s instead of failing on the first problem, so a
//! caller can log or serialize the whole list. `wellformedness` is the only
//! check so far.

pub mod wellformedness;

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};
use crate::models::{ComponentId, SpannerId};

pub use wellformedness::{assert_wellformed, check_wellformedness};

/// Severity level for violations
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One problem found in a tree
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub severity: Severity,
    /// Kind identifier (e.g. "rank_mismatch", "spanner_order")
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spanner: Option<SpannerId>,
    pub message: String,
}

impl Violation {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind: kind.into(),
            component: None,
            spanner: None,
            message: message.into(),
        }
    }

    pub fn warning(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    pub fn at_component(mut self, component: ComponentId) -> Self {
        self.component = Some(component);
        self
    }

    pub fn at_spanner(mut self, spanner: SpannerId) -> Self {
        self.spanner = Some(spanner);
        self
    }
}

/// Collection of violations for a whole tree
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub violations: Vec<Violation>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn to_json(&self) -> ScoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScoreError::MalformedTree(e.to_string()))
    }
}

impl From<Vec<Violation>> for Diagnostics {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        diagnostics.add(Violation::warning("empty_container", "container has no children"));
        assert!(!diagnostics.has_errors());
        diagnostics.add(Violation::error("rank_mismatch", "rank 2 stored as 1"));
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_violation_json() {
        let diagnostics = Diagnostics::from(vec![Violation::error("spanner_order", "out of order")]);
        let json = diagnostics.to_json().unwrap();
        assert!(json.contains("\"severity\": \"error\""));
        assert!(json.contains("\"kind\": \"spanner_order\""));
        assert!(!json.contains("\"component\""));
    }
}
