//! Temporal constraints over the protocol graph and the critical-path
//! analysis derived from them.
pub mod constraint;
pub mod schedule;

pub use constraint::{
    ConstraintId, Duration, TimeConstraint, TimeProperty, TimeRef, TimeVariable,
};
pub use schedule::{check_consistency, minimum_duration, ConstraintSource, TemporalConflict};

pub(crate) use schedule::dangling_references;
