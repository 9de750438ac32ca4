//! Defines the core data structures for the protocol activity graph.
pub mod activity;
pub mod flow;
pub mod protocol;

// Re-export key types for convenient access
pub use activity::{Activity, ActivityId, ActivityKind, Pin, PinDirection};
pub use flow::{Endpoint, Flow, FlowId, PinRef};
pub use protocol::Protocol;
