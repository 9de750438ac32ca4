//! Defines the error taxonomy for protocol construction and queries.
//!
//! Construction operations fail fast with one of these errors and leave the
//! graph unmodified. The validator never returns them for content problems;
//! it accumulates issues into a [`crate::validation::ValidationReport`].

use thiserror::Error;

/// Violations of the graph's structural invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("endpoint does not belong to this protocol: {0}")]
    UnknownEndpoint(String),
    #[error("activity '{activity}' has no port named '{port}'")]
    UnknownPort { activity: String, port: String },
    #[error("port '{port}' on activity '{activity}' is already bound")]
    PortAlreadyBound { activity: String, port: String },
    // Named `src` because thiserror treats a `source` field as a wrapped
    // error; these fields are rendered endpoints.
    #[error("identical flow from {src} to {dest} already exists")]
    DuplicateFlow { src: String, dest: String },
    #[error("protocol output '{0}' is already designated")]
    DuplicateOutputName(String),
    #[error("flow would close a cycle through activity '{0}'")]
    CycleDetected(String),
}

/// Violations of pin/value type compatibility.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("value of type '{found}' cannot bind to port '{port}' expecting '{expected}'")]
    TypeMismatch {
        port: String,
        expected: String,
        found: String,
    },
    #[error("flow endpoints carry incompatible types: {src} -> {dest}")]
    IncompatibleEndpoints { src: String, dest: String },
    #[error("required input '{port}' on activity '{activity}' has no binding and no default")]
    MissingRequiredInput { activity: String, port: String },
}

/// Problems detected by temporal analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemporalError {
    #[error("temporal constraints are infeasible: {0}")]
    InfeasibleConstraints(String),
    #[error("time constraint '{0}' refers to an element outside this protocol")]
    DanglingTimeReference(String),
    #[error("time constraints mix units '{0}' and '{1}'")]
    UnitMismatch(String, String),
}

/// Failures of the primitive catalog collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog has no primitive named '{0}'")]
    NotFound(String),
    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),
    #[error("primitive '{0}' is already registered")]
    DuplicatePrimitive(String),
}

/// Umbrella error for any construction call or scheduling query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Temporal(#[from] TemporalError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_messages_name_both_endpoints() {
        let dup = StructuralError::DuplicateFlow {
            src: "plate.samples".into(),
            dest: "final".into(),
        };
        assert_eq!(
            dup.to_string(),
            "identical flow from plate.samples to final already exists"
        );

        let bad = TypeError::IncompatibleEndpoints {
            src: "plate.samples".into(),
            dest: "step.amount".into(),
        };
        assert_eq!(
            bad.to_string(),
            "flow endpoints carry incompatible types: plate.samples -> step.amount"
        );
    }
}
