//! The primitive catalog: the external collaborator that maps a primitive
//! name to its declared input/output port signature. Consumed read-only by
//! the graph; this module also provides an in-memory implementation used by
//! library import and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::value::{ParameterValue, ValueType};

/// Declares one input port of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub value_type: Option<ValueType>,
    pub optional: bool,
    /// Used when an optional port is left unbound.
    pub default: Option<ParameterValue>,
}

/// Declares one output port of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub value_type: Option<ValueType>,
}

/// The declared port signature of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Adds a required input port.
    pub fn input(mut self, name: impl Into<String>, value_type: Option<ValueType>) -> Self {
        self.inputs.push(InputSpec {
            name: name.into(),
            value_type,
            optional: false,
            default: None,
        });
        self
    }

    /// Adds an optional input port, with an optional default value.
    pub fn optional_input(
        mut self,
        name: impl Into<String>,
        value_type: Option<ValueType>,
        default: Option<ParameterValue>,
    ) -> Self {
        self.inputs.push(InputSpec {
            name: name.into(),
            value_type,
            optional: true,
            default,
        });
        self
    }

    /// Adds an output port.
    pub fn output(mut self, name: impl Into<String>, value_type: Option<ValueType>) -> Self {
        self.outputs.push(OutputSpec {
            name: name.into(),
            value_type,
        });
        self
    }

    pub fn find_input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// Read-only lookup interface consumed during activity construction.
pub trait PrimitiveCatalog {
    /// Resolves a primitive name to its signature.
    fn lookup(&self, name: &str) -> Result<&Signature, CatalogError>;
}

/// An in-memory catalog assembled from one or more primitive libraries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryCatalog {
    primitives: BTreeMap<String, Signature>,
}

impl LibraryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single primitive. Re-registering a name is rejected so a
    /// later library cannot silently shadow an earlier one.
    pub fn register(&mut self, signature: Signature) -> Result<(), CatalogError> {
        if self.primitives.contains_key(&signature.name) {
            return Err(CatalogError::DuplicatePrimitive(signature.name.clone()));
        }
        self.primitives.insert(signature.name.clone(), signature);
        Ok(())
    }

    /// Imports a batch of primitives (a "library"). Fails on the first
    /// duplicate, leaving earlier registrations in place.
    pub fn extend(
        &mut self,
        library: impl IntoIterator<Item = Signature>,
    ) -> Result<(), CatalogError> {
        for signature in library {
            self.register(signature)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl PrimitiveCatalog for LibraryCatalog {
    fn lookup(&self, name: &str) -> Result<&Signature, CatalogError> {
        self.primitives
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provision() -> Signature {
        Signature::new("Provision")
            .input("resource", None)
            .input("destination", Some(ValueType::from("samples")))
            .optional_input("amount", Some(ValueType::from("microliter")), None)
            .output("samples", Some(ValueType::from("samples")))
    }

    #[test]
    fn test_lookup_resolves_registered_signature() {
        let mut catalog = LibraryCatalog::new();
        catalog.register(provision()).unwrap();

        let sig = catalog.lookup("Provision").unwrap();
        assert_eq!(sig.inputs.len(), 3);
        assert!(sig.find_input("amount").unwrap().optional);
        assert!(sig.find_output("samples").is_some());
    }

    #[test]
    fn test_lookup_unknown_name() {
        let catalog = LibraryCatalog::new();
        assert_eq!(
            catalog.lookup("Provision").unwrap_err(),
            CatalogError::NotFound("Provision".to_string())
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut catalog = LibraryCatalog::new();
        catalog.register(provision()).unwrap();
        assert_eq!(
            catalog.register(provision()).unwrap_err(),
            CatalogError::DuplicatePrimitive("Provision".to_string())
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_library_import_is_atomic_per_signature() {
        let mut catalog = LibraryCatalog::new();
        let library = vec![
            Signature::new("EmptyContainer")
                .input("specification", None)
                .output("samples", Some(ValueType::from("samples"))),
            provision(),
        ];
        catalog.extend(library).unwrap();
        assert_eq!(catalog.len(), 2);

        // A second import containing one clash stops at the clash.
        let err = catalog
            .extend(vec![Signature::new("Provision")])
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicatePrimitive("Provision".into()));
    }
}
