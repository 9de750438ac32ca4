//! Defines the `Activity` node type: a protocol step, a fan-in join, or one
//! of the two sentinel markers.

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::catalog::Signature;
use crate::value::{ParameterValue, ValueType};

/// A unique, stable identifier for an activity within its protocol.
///
/// This is a type alias for `petgraph::graph::NodeIndex` to abstract the
/// underlying graph implementation.
pub type ActivityId = NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    Input,
    Output,
}

/// A named, typed port on an activity. Pins exist only as addressable
/// endpoints for flows; they hold no values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    pub direction: PinDirection,
    pub value_type: Option<ValueType>,
    /// Input pins only: whether the port may be left unbound.
    pub optional: bool,
    /// Input pins only: the value used when an optional port is unbound.
    pub default: Option<ParameterValue>,
}

/// What kind of node an activity is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivityKind {
    /// The unique entry sentinel, created with the protocol.
    Initial,
    /// The unique exit sentinel, created with the protocol.
    Final,
    /// A fan-in point that completes once all incoming flows have fired.
    Join,
    /// An executable step, carrying its resolved catalog signature.
    Primitive(Signature),
}

/// A node in the protocol graph. Identity is immutable once added; only the
/// input bindings accumulate afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Display name, uniquified by the owning protocol.
    pub name: String,
    pub kind: ActivityKind,
    pub(crate) pins: SmallVec<[Pin; 4]>,
    pub(crate) bindings: BTreeMap<String, ParameterValue>,
    /// Insertion rank, used to break topological-order ties.
    pub(crate) rank: u32,
}

impl Activity {
    pub(crate) fn sentinel(kind: ActivityKind, name: &str, rank: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            pins: SmallVec::new(),
            bindings: BTreeMap::new(),
            rank,
        }
    }

    pub(crate) fn join(name: String, rank: u32) -> Self {
        Self {
            name,
            kind: ActivityKind::Join,
            pins: SmallVec::new(),
            bindings: BTreeMap::new(),
            rank,
        }
    }

    /// Builds a primitive executable, materializing one pin per declared port.
    pub(crate) fn from_signature(name: String, signature: Signature, rank: u32) -> Self {
        let mut pins = SmallVec::with_capacity(signature.inputs.len() + signature.outputs.len());
        for input in &signature.inputs {
            pins.push(Pin {
                name: input.name.clone(),
                direction: PinDirection::Input,
                value_type: input.value_type.clone(),
                optional: input.optional,
                default: input.default.clone(),
            });
        }
        for output in &signature.outputs {
            pins.push(Pin {
                name: output.name.clone(),
                direction: PinDirection::Output,
                value_type: output.value_type.clone(),
                optional: false,
                default: None,
            });
        }
        Self {
            name,
            kind: ActivityKind::Primitive(signature),
            pins,
            bindings: BTreeMap::new(),
            rank,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, ActivityKind::Join)
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.kind {
            ActivityKind::Primitive(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter()
    }

    pub fn binding(&self, port: &str) -> Option<&ParameterValue> {
        self.bindings.get(port)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}
