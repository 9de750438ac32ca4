//! Structural validation rules: endpoint membership, reachability, and the
//! dead-end heuristic.

use petgraph::Direction;

use crate::graph::{Endpoint, PinDirection, Protocol};
use crate::validation::report::{IssueKind, ValidationReport};

/// Every pin referenced by a flow must belong to an activity in this graph,
/// with the right direction for its role.
pub(crate) fn check_flow_endpoints(protocol: &Protocol, report: &mut ValidationReport) {
    for (_, flow) in protocol.flows() {
        if let Endpoint::Pin(pin) = &flow.source {
            if protocol.resolve_pin(pin, PinDirection::Output).is_err() {
                report.error(
                    IssueKind::Structural,
                    Some(pin.activity),
                    format!("flow source {} is not an output pin of this graph", pin),
                );
            }
        }
        if let Endpoint::Pin(pin) = &flow.dest {
            if protocol.resolve_pin(pin, PinDirection::Input).is_err() {
                report.error(
                    IssueKind::Structural,
                    Some(pin.activity),
                    format!("flow destination {} is not an input pin of this graph", pin),
                );
            }
        }
    }
}

/// Every non-initial activity must be reachable from `initial`. An
/// unreachable `final` only warns: it means the protocol produces nothing
/// yet, which is legal for a trivial or unfinished protocol.
pub(crate) fn check_reachability(protocol: &Protocol, report: &mut ValidationReport) {
    let reachable = protocol.downstream_from(protocol.initial());
    let trivial = protocol.activity_count() == 2;
    for (id, activity) in protocol.activities() {
        if reachable.contains(&id) || id == protocol.initial() {
            continue;
        }
        if id == protocol.final_activity() {
            if !trivial {
                report.warn(
                    IssueKind::Structural,
                    Some(id),
                    "no flow reaches 'final'; the protocol produces no outputs".to_string(),
                );
            }
        } else {
            report.error(
                IssueKind::Structural,
                Some(id),
                format!("activity '{}' is unreachable from 'initial'", activity.name),
            );
        }
    }
}

/// `final` must be reachable from every designated output's source pin.
pub(crate) fn check_output_reachability(protocol: &Protocol, report: &mut ValidationReport) {
    for (name, pin) in protocol.outputs() {
        if !protocol
            .downstream_from(pin.activity)
            .contains(&protocol.final_activity())
        {
            report.error(
                IssueKind::Structural,
                Some(pin.activity),
                format!("output '{}' cannot reach 'final' from {}", name, pin),
            );
        }
    }
}

/// An activity with no outgoing flow that is not a protocol output source is
/// a likely authoring mistake. Sentinels are exempt.
pub(crate) fn check_dead_ends(protocol: &Protocol, report: &mut ValidationReport) {
    for (id, activity) in protocol.activities() {
        if id == protocol.initial() || id == protocol.final_activity() {
            continue;
        }
        let has_outgoing = protocol
            .graph
            .edges_directed(id, Direction::Outgoing)
            .next()
            .is_some();
        let is_output_source = protocol.outputs().any(|(_, pin)| pin.activity == id);
        if !has_outgoing && !is_output_source {
            report.warn(
                IssueKind::DeadEnd,
                Some(id),
                format!(
                    "activity '{}' feeds nothing and is not a protocol output",
                    activity.name
                ),
            );
        }
    }
}
