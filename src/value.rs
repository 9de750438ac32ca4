//! Defines the port and value model: measured quantities, opaque pin types,
//! and the values that can be bound to an activity's input ports.

use serde::{Deserialize, Serialize};

use crate::graph::PinRef;

/// The unit of a measured quantity (e.g. `"second"`, `"microliter"`).
///
/// Units are opaque identifiers; the core compares them for equality and
/// never interprets their semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit(pub String);

impl Unit {
    /// The dimensionless unit, used when no constraint declares one.
    pub fn dimensionless() -> Self {
        Unit("1".to_string())
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Unit(s.to_string())
    }
}

impl From<String> for Unit {
    fn from(s: String) -> Self {
        Unit(s)
    }
}

/// A numeric value paired with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub value: f64,
    pub unit: Unit,
}

impl Measure {
    pub fn new(value: f64, unit: impl Into<Unit>) -> Self {
        Self { value, unit: unit.into() }
    }
}

/// The declared type of a pin (e.g. a unit name or an ontology term).
///
/// Like [`Unit`], this is opaque: compatibility is plain equality, with an
/// absent type acting as a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType(pub String);

impl From<&str> for ValueType {
    fn from(s: &str) -> Self {
        ValueType(s.to_string())
    }
}

impl From<String> for ValueType {
    fn from(s: String) -> Self {
        ValueType(s)
    }
}

/// A value bound to an activity's input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// A literal measured quantity.
    Measure(Measure),
    /// An opaque constant (e.g. a coordinate range or a resource identifier).
    Literal(String),
    /// The output pin of another activity; binding one also inserts the
    /// corresponding data flow.
    SourcePin(PinRef),
}

impl ParameterValue {
    /// The type tag this value carries on its own, without graph context.
    ///
    /// `SourcePin` values resolve their type through the owning protocol,
    /// so they (and untyped literals) report `None` here.
    pub fn local_type(&self) -> Option<ValueType> {
        match self {
            ParameterValue::Measure(m) => Some(ValueType(m.unit.0.clone())),
            ParameterValue::Literal(_) => None,
            ParameterValue::SourcePin(_) => None,
        }
    }
}

/// The single compatibility predicate the graph and validator delegate to.
///
/// An absent type on either side is a wildcard; otherwise the two opaque
/// tags must be equal.
pub fn compatible(declared: Option<&ValueType>, found: Option<&ValueType>) -> bool {
    match (declared, found) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, true)]
    #[case(Some("microliter"), None, true)] // untyped value is a wildcard
    #[case(None, Some("microliter"), true)] // untyped port accepts anything
    #[case(Some("microliter"), Some("microliter"), true)]
    #[case(Some("microliter"), Some("nanometer"), false)]
    fn test_compatibility(
        #[case] declared: Option<&str>,
        #[case] found: Option<&str>,
        #[case] expected: bool,
    ) {
        let declared = declared.map(ValueType::from);
        let found = found.map(ValueType::from);
        assert_eq!(compatible(declared.as_ref(), found.as_ref()), expected);
    }

    #[test]
    fn test_measure_carries_its_unit_as_type() {
        let v = ParameterValue::Measure(Measure::new(100.0, "microliter"));
        assert_eq!(v.local_type(), Some(ValueType::from("microliter")));

        let lit = ParameterValue::Literal("A1:D1".to_string());
        assert_eq!(lit.local_type(), None);
    }
}
