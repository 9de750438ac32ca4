//! Defines flow edges and their endpoints. A flow is a directed dependency:
//! pin-to-pin flows carry data, activity-level endpoints express control
//! ordering, and any activity used as a destination joins implicitly on all
//! of its incoming flows.

use std::fmt;

use petgraph::stable_graph::EdgeIndex;
use serde::{Deserialize, Serialize};

use super::activity::ActivityId;

/// A unique, stable identifier for a flow within its protocol.
pub type FlowId = EdgeIndex;

/// Addresses one named pin on one activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    pub activity: ActivityId,
    pub pin: String,
}

impl PinRef {
    pub fn new(activity: ActivityId, pin: impl Into<String>) -> Self {
        Self { activity, pin: pin.into() }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.activity, self.pin)
    }
}

/// One side of a flow: either a whole activity (control dependency) or a
/// specific pin (data dependency).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Activity(ActivityId),
    Pin(PinRef),
}

impl Endpoint {
    /// The activity this endpoint belongs to.
    pub fn activity(&self) -> ActivityId {
        match self {
            Endpoint::Activity(id) => *id,
            Endpoint::Pin(p) => p.activity,
        }
    }

    pub fn pin_name(&self) -> Option<&str> {
        match self {
            Endpoint::Activity(_) => None,
            Endpoint::Pin(p) => Some(&p.pin),
        }
    }
}

impl From<ActivityId> for Endpoint {
    fn from(id: ActivityId) -> Self {
        Endpoint::Activity(id)
    }
}

impl From<PinRef> for Endpoint {
    fn from(p: PinRef) -> Self {
        Endpoint::Pin(p)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Activity(id) => write!(f, "{:?}", id),
            Endpoint::Pin(p) => write!(f, "{}", p),
        }
    }
}

/// The weight stored on each graph edge. The petgraph edge already connects
/// the two endpoint activities; the weight preserves pin-level addressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub source: Endpoint,
    pub dest: Endpoint,
}
