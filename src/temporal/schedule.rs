//! Critical-path analysis over the protocol graph.
//!
//! Every flow contributes the ordering constraint `end(source) <=
//! start(dest)`; durations and pinned time variables tighten the bounds.
//! Propagation runs once in topological order, assigning each activity an
//! earliest start equal to the maximum over its predecessors' earliest
//! ends. Pinned values act as lower bounds at their attachment point; a
//! pinned value below a structurally derived bound is a conflict.

use std::collections::HashMap;

use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use super::constraint::{ConstraintId, TimeConstraint, TimeProperty, TimeRef};
use crate::error::{ProtocolError, TemporalError};
use crate::graph::{ActivityId, FlowId, Protocol};
use crate::value::{Measure, Unit};

// Tolerance for comparing derived timepoints.
const EPS: f64 = 1e-9;

/// One side of a reported conflict: either a user constraint or a bound the
/// graph structure forces on an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintSource {
    Constraint(ConstraintId),
    Structural(ActivityId),
}

/// Two temporal assertions that cannot both hold.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalConflict {
    pub first: ConstraintSource,
    pub second: ConstraintSource,
    pub message: String,
}

/// The minimum value of `end(final) - start(initial)` consistent with all
/// constraints.
pub fn minimum_duration(protocol: &Protocol) -> Result<Measure, ProtocolError> {
    debug!(protocol = %protocol.name, "computing minimum duration");
    let mut model = Model::index(protocol);
    if let Some((_, name)) = model.dangling.first() {
        return Err(TemporalError::DanglingTimeReference(name.clone()).into());
    }
    if let Some((a, b)) = model.unit_clash.clone() {
        return Err(TemporalError::UnitMismatch(a.0, b.0).into());
    }
    let span = model.propagate(protocol)?;
    if let Some(conflict) = model.conflicts.first() {
        return Err(TemporalError::InfeasibleConstraints(conflict.message.clone()).into());
    }
    let unit = model
        .unit
        .map(|(u, _)| u)
        .unwrap_or_else(Unit::dimensionless);
    Ok(Measure { value: span, unit })
}

/// Reports every pair of constraints in conflict instead of stopping at the
/// first. Dangling references are the validator's concern and are skipped
/// here, as is propagation over a cyclic graph (reachable only through
/// deserialization): without a topological order there are no derived
/// bounds to conflict with, and the validator reports the cycle itself.
pub fn check_consistency(protocol: &Protocol) -> Vec<TemporalConflict> {
    let mut model = Model::index(protocol);
    if let Err(e) = model.propagate(protocol) {
        debug!(error = %e, "skipping temporal propagation");
    }
    model.conflicts
}

/// Time constraints whose `time_of` reference does not resolve in this
/// protocol.
pub(crate) fn dangling_references(protocol: &Protocol) -> Vec<(ConstraintId, String)> {
    Model::index(protocol).dangling
}

/// The numeric model extracted from a protocol's constraint set.
struct Model {
    unit: Option<(Unit, ConstraintId)>,
    unit_clash: Option<(Unit, Unit)>,
    conflicts: Vec<TemporalConflict>,
    dangling: Vec<(ConstraintId, String)>,
    /// Per-activity duration lower bound (max over asserted durations).
    durations: HashMap<ActivityId, (f64, ConstraintId)>,
    /// Pinned absolute timepoints per (activity, property).
    pinned: HashMap<(ActivityId, TimeProperty), (f64, ConstraintId)>,
    /// Pinned timepoints attached to flows, applied at the flow's target.
    flow_pins: HashMap<FlowId, Vec<(f64, ConstraintId)>>,
}

impl Model {
    fn index(protocol: &Protocol) -> Self {
        let mut model = Model {
            unit: None,
            unit_clash: None,
            conflicts: Vec::new(),
            dangling: Vec::new(),
            durations: HashMap::new(),
            pinned: HashMap::new(),
            flow_pins: HashMap::new(),
        };
        for (id, constraint) in protocol.time_constraints() {
            if let Some(measure) = constraint.value() {
                if !model.admit_unit(id, &measure.unit) {
                    continue;
                }
            }
            match constraint {
                TimeConstraint::Duration(d) => {
                    if protocol.activity(d.time_of).is_none() {
                        model.dangling.push((id, d.name.clone()));
                        continue;
                    }
                    match model.durations.get(&d.time_of).copied() {
                        None => {
                            model.durations.insert(d.time_of, (d.value.value, id));
                        }
                        Some((prev, prev_id)) => {
                            if (prev - d.value.value).abs() > EPS {
                                model.conflict(
                                    ConstraintSource::Constraint(id),
                                    ConstraintSource::Constraint(prev_id),
                                    format!(
                                        "durations '{}' and '{}' assert different values for the same activity",
                                        d.name,
                                        protocol.constraint(prev_id).map(|c| c.name()).unwrap_or(""),
                                    ),
                                );
                            }
                            if d.value.value > prev {
                                model.durations.insert(d.time_of, (d.value.value, id));
                            }
                        }
                    }
                }
                TimeConstraint::Variable(v) => {
                    let Some(measure) = &v.value else { continue };
                    match v.time_of {
                        TimeRef::Activity(act) => {
                            if protocol.activity(act).is_none() {
                                model.dangling.push((id, v.name.clone()));
                                continue;
                            }
                            let key = (act, v.property);
                            match model.pinned.get(&key).copied() {
                                None => {
                                    model.pinned.insert(key, (measure.value, id));
                                }
                                Some((prev, prev_id)) => {
                                    if (prev - measure.value).abs() > EPS {
                                        model.conflict(
                                            ConstraintSource::Constraint(id),
                                            ConstraintSource::Constraint(prev_id),
                                            format!(
                                                "time variables '{}' and '{}' pin the same timepoint to different values",
                                                v.name,
                                                protocol
                                                    .constraint(prev_id)
                                                    .map(|c| c.name())
                                                    .unwrap_or(""),
                                            ),
                                        );
                                    }
                                }
                            }
                        }
                        TimeRef::Flow(flow) => {
                            if protocol.flow(flow).is_none() {
                                model.dangling.push((id, v.name.clone()));
                                continue;
                            }
                            model
                                .flow_pins
                                .entry(flow)
                                .or_default()
                                .push((measure.value, id));
                        }
                    }
                }
            }
        }
        model
    }

    /// Records the canonical unit, or the clash when constraints disagree.
    fn admit_unit(&mut self, id: ConstraintId, unit: &Unit) -> bool {
        let Some((canonical, first_id)) = self.unit.clone() else {
            self.unit = Some((unit.clone(), id));
            return true;
        };
        if canonical == *unit {
            return true;
        }
        if self.unit_clash.is_none() {
            self.unit_clash = Some((canonical.clone(), unit.clone()));
            self.conflict(
                ConstraintSource::Constraint(id),
                ConstraintSource::Constraint(first_id),
                format!(
                    "constraint uses unit '{}' but the constraint set established '{}'",
                    unit.0, canonical.0
                ),
            );
        }
        false
    }

    fn conflict(&mut self, first: ConstraintSource, second: ConstraintSource, message: String) {
        self.conflicts.push(TemporalConflict {
            first,
            second,
            message,
        });
    }

    /// Single forward pass in topological order. Returns the span between
    /// the earliest start of `initial` and the earliest end of `final`.
    fn propagate(&mut self, protocol: &Protocol) -> Result<f64, ProtocolError> {
        let order = protocol.topological_order()?;
        let mut start: HashMap<ActivityId, f64> = HashMap::new();
        let mut end: HashMap<ActivityId, f64> = HashMap::new();
        let mut end_witness: HashMap<ActivityId, ConstraintSource> = HashMap::new();

        for id in order {
            // Earliest start: max over predecessor earliest ends and any
            // pinned timepoints on the incoming flows.
            let mut lower = 0.0_f64;
            let mut witness = ConstraintSource::Structural(id);
            for edge in protocol.graph.edges_directed(id, Direction::Incoming) {
                let pred_end = end[&edge.source()];
                if pred_end > lower {
                    lower = pred_end;
                    witness = end_witness[&edge.source()].clone();
                }
                let pins = self.flow_pins.get(&edge.id()).cloned().unwrap_or_default();
                for (value, pin_id) in pins {
                    if value + EPS < pred_end {
                        let second = end_witness[&edge.source()].clone();
                        self.conflict(
                            ConstraintSource::Constraint(pin_id),
                            second,
                            format!(
                                "flow timepoint pinned to {} before its source can finish at {}",
                                value, pred_end
                            ),
                        );
                    } else if value > lower {
                        lower = value;
                        witness = ConstraintSource::Constraint(pin_id);
                    }
                }
            }

            let mut earliest_start = lower;
            if let Some(&(value, pin_id)) = self.pinned.get(&(id, TimeProperty::StartedAtTime)) {
                if value + EPS < lower {
                    self.conflicts.push(TemporalConflict {
                        first: ConstraintSource::Constraint(pin_id),
                        second: witness.clone(),
                        message: format!(
                            "activity '{}' is pinned to start at {} but cannot start before {}",
                            protocol.activity(id).map(|a| a.name.as_str()).unwrap_or(""),
                            value,
                            lower
                        ),
                    });
                    // Continue with the structural bound to avoid cascades.
                } else {
                    earliest_start = value;
                    witness = ConstraintSource::Constraint(pin_id);
                }
            }
            start.insert(id, earliest_start);

            let mut earliest_end = earliest_start;
            let mut witness_end = witness;
            if let Some(&(duration, dur_id)) = self.durations.get(&id) {
                earliest_end = earliest_start + duration;
                witness_end = ConstraintSource::Constraint(dur_id);
            }
            if let Some(&(value, pin_id)) = self.pinned.get(&(id, TimeProperty::EndedAtTime)) {
                if value + EPS < earliest_end {
                    self.conflicts.push(TemporalConflict {
                        first: ConstraintSource::Constraint(pin_id),
                        second: witness_end.clone(),
                        message: format!(
                            "activity '{}' is pinned to end at {} but cannot end before {}",
                            protocol.activity(id).map(|a| a.name.as_str()).unwrap_or(""),
                            value,
                            earliest_end
                        ),
                    });
                } else {
                    earliest_end = value;
                    witness_end = ConstraintSource::Constraint(pin_id);
                }
            }
            end.insert(id, earliest_end);
            end_witness.insert(id, witness_end);
        }

        Ok(end[&protocol.final_activity()] - start[&protocol.initial()])
    }
}
