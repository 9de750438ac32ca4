//! Defines the structured output of a validation pass.

use serde::{Deserialize, Serialize};

use crate::graph::ActivityId;

/// The specific category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// A flow endpoint or reachability invariant is broken.
    Structural,
    /// A bound value is incompatible with its port, or a required input is
    /// missing.
    Binding,
    /// The graph is not a DAG.
    Cycle,
    /// Temporal constraints conflict.
    Temporal,
    /// A time constraint references an element outside this protocol.
    DanglingTime,
    /// An activity feeds nothing and is not a protocol output.
    DeadEnd,
}

/// One problem found in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// The activity the issue was detected at, when one is identifiable.
    pub subject: Option<ActivityId>,
    pub message: String,
}

/// Everything a validation pass found, split by severity. Errors must be
/// fixed before execution; warnings are advisory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, kind: IssueKind, subject: Option<ActivityId>, message: String) {
        self.errors.push(ValidationIssue {
            kind,
            subject,
            message,
        });
    }

    pub(crate) fn warn(&mut self, kind: IssueKind, subject: Option<ActivityId>, message: String) {
        self.warnings.push(ValidationIssue {
            kind,
            subject,
            message,
        });
    }
}
