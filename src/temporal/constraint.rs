//! Time variables and durations: single-timepoint assertions attached to
//! graph elements by non-owning reference.

use serde::{Deserialize, Serialize};

use crate::graph::{ActivityId, FlowId};
use crate::value::Measure;

/// A unique, stable identifier for a time constraint within its protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ConstraintId(pub u32);

impl ConstraintId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
    pub fn new(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// Which timepoint of the referenced element a variable asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeProperty {
    StartedAtTime,
    EndedAtTime,
}

/// The graph element a time constraint annotates. Non-owning: validation
/// detects identifiers that do not resolve instead of following them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRef {
    Activity(ActivityId),
    Flow(FlowId),
}

/// Asserts that one timepoint of an activity or flow equals a value.
///
/// A variable without a value is unconstrained; it names a timepoint
/// without pinning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeVariable {
    pub name: String,
    pub value: Option<Measure>,
    pub property: TimeProperty,
    pub time_of: TimeRef,
}

impl TimeVariable {
    pub fn pinned(
        name: impl Into<String>,
        value: Measure,
        property: TimeProperty,
        time_of: TimeRef,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            property,
            time_of,
        }
    }

    pub fn free(name: impl Into<String>, property: TimeProperty, time_of: TimeRef) -> Self {
        Self {
            name: name.into(),
            value: None,
            property,
            time_of,
        }
    }
}

/// Sugar for `EndedAtTime - StartedAtTime = value` on one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub name: String,
    pub value: Measure,
    pub time_of: ActivityId,
}

impl Duration {
    pub fn new(name: impl Into<String>, value: Measure, time_of: ActivityId) -> Self {
        Self {
            name: name.into(),
            value,
            time_of,
        }
    }
}

/// One entry in a protocol's temporal constraint set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeConstraint {
    Variable(TimeVariable),
    Duration(Duration),
}

impl TimeConstraint {
    pub fn name(&self) -> &str {
        match self {
            TimeConstraint::Variable(v) => &v.name,
            TimeConstraint::Duration(d) => &d.name,
        }
    }

    pub fn value(&self) -> Option<&Measure> {
        match self {
            TimeConstraint::Variable(v) => v.value.as_ref(),
            TimeConstraint::Duration(d) => Some(&d.value),
        }
    }
}
