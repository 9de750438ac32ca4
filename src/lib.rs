//! Core model for laboratory protocol activity graphs.
//!
//! A [`Protocol`](graph::Protocol) is a directed acyclic graph of typed
//! activities (primitive steps resolved against a
//! [`PrimitiveCatalog`](catalog::PrimitiveCatalog), fan-in joins, and the
//! `initial`/`final` sentinels) connected by data and control flows.
//! Temporal annotations ([`TimeVariable`](temporal::TimeVariable),
//! [`Duration`](temporal::Duration)) attach to graph elements by stable id,
//! and the crate derives feasibility and the minimum total duration via
//! critical-path propagation.
//!
//! Construction calls fail fast and leave the graph untouched on failure;
//! the [`Validator`](validation::Validator) instead accumulates every
//! problem into a single report. The core performs no I/O and defines no
//! file format: external serializers consume the enumerable views on
//! `Protocol`.

pub mod catalog;
pub mod error;
pub mod graph;
pub mod temporal;
pub mod validation;
pub mod value;

pub use catalog::{LibraryCatalog, PrimitiveCatalog, Signature};
pub use error::{CatalogError, ProtocolError, StructuralError, TemporalError, TypeError};
pub use graph::{Activity, ActivityId, ActivityKind, Endpoint, Flow, FlowId, Pin, PinRef, Protocol};
pub use temporal::{
    ConstraintId, ConstraintSource, Duration, TemporalConflict, TimeConstraint, TimeProperty,
    TimeRef, TimeVariable,
};
pub use validation::{ValidationReport, Validator};
pub use value::{Measure, ParameterValue, Unit, ValueType};
