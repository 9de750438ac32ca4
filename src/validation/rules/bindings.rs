//! Binding validation rules: required inputs and bound-value compatibility.

use std::collections::HashSet;

use petgraph::Direction;

use crate::error::TypeError;
use crate::graph::Protocol;
use crate::validation::report::{IssueKind, ValidationReport};
use crate::value::compatible;

/// Re-checks every primitive activity's inputs. A required input is
/// satisfied by an explicit binding, an incoming data flow targeting its
/// pin, or a declared default.
pub(crate) fn check_bindings(protocol: &Protocol, report: &mut ValidationReport) {
    for (id, activity) in protocol.activities() {
        let Some(signature) = activity.signature() else {
            continue;
        };

        // Input pins fed by an incoming data flow.
        let fed: HashSet<&str> = protocol
            .graph
            .edges_directed(id, Direction::Incoming)
            .filter_map(|e| e.weight().dest.pin_name())
            .collect();

        for input in &signature.inputs {
            match activity.binding(&input.name) {
                Some(value) => match protocol.value_type_of(value) {
                    Ok(found) => {
                        if !compatible(input.value_type.as_ref(), found.as_ref()) {
                            report.error(
                                IssueKind::Binding,
                                Some(id),
                                format!(
                                    "binding for '{}' on '{}' is incompatible with the declared port type",
                                    input.name, activity.name
                                ),
                            );
                        }
                    }
                    Err(e) => {
                        report.error(
                            IssueKind::Binding,
                            Some(id),
                            format!(
                                "binding for '{}' on '{}' does not resolve: {}",
                                input.name, activity.name, e
                            ),
                        );
                    }
                },
                None => {
                    let satisfied =
                        fed.contains(input.name.as_str()) || input.optional || input.default.is_some();
                    if !satisfied {
                        let missing = TypeError::MissingRequiredInput {
                            activity: activity.name.clone(),
                            port: input.name.clone(),
                        };
                        report.error(IssueKind::Binding, Some(id), missing.to_string());
                    }
                }
            }
        }
    }
}
