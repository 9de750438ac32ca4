//! Static analysis of a protocol: structural, binding, and temporal checks
//! reported together in one pass.
pub mod report;
pub(crate) mod rules;
pub mod validator;

pub use report::{IssueKind, ValidationIssue, ValidationReport};
pub use validator::Validator;
