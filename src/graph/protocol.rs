//! The protocol graph: the owning arena for activities, flows, output
//! designations and time constraints, plus the graph algorithms run over it.
//!
//! Construction calls fail fast and leave the graph unmodified on failure.
//! Every check runs before the first mutation, so a rejected `add_flow` or
//! `bind` never inserts a partial edge.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::activity::{Activity, ActivityId, ActivityKind, Pin, PinDirection};
use super::flow::{Endpoint, Flow, FlowId, PinRef};
use crate::catalog::PrimitiveCatalog;
use crate::error::{CatalogError, ProtocolError, StructuralError, TypeError};
use crate::temporal::{
    check_consistency, minimum_duration, ConstraintId, Duration, TemporalConflict, TimeConstraint,
    TimeVariable,
};
use crate::validation::{ValidationReport, Validator};
use crate::value::{compatible, Measure, ParameterValue, ValueType};

/// A directed acyclic graph of typed activities with temporal annotations.
///
/// The two sentinel activities `initial` and `final` are created with the
/// protocol and can never be removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub description: Option<String>,
    pub(crate) graph: StableDiGraph<Activity, Flow>,
    initial: ActivityId,
    terminal: ActivityId,
    outputs: BTreeMap<String, PinRef>,
    pub(crate) constraints: Vec<TimeConstraint>,
    next_rank: u32,
    // Ephemeral uniqueness cache, rebuilt after deserialization.
    #[serde(skip)]
    used_names: HashSet<String>,
}

impl Protocol {
    pub fn new(name: impl Into<String>) -> Self {
        let mut graph = StableDiGraph::new();
        let initial = graph.add_node(Activity::sentinel(ActivityKind::Initial, "initial", 0));
        let terminal = graph.add_node(Activity::sentinel(ActivityKind::Final, "final", 1));
        Self {
            name: name.into(),
            description: None,
            graph,
            initial,
            terminal,
            outputs: BTreeMap::new(),
            constraints: Vec::new(),
            next_rank: 2,
            used_names: ["initial", "final"].iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Rebuilds the `used_names` cache after deserialization.
    pub fn rebuild_name_cache(&mut self) {
        self.used_names = self
            .graph
            .node_indices()
            .map(|id| self.graph[id].name.clone())
            .collect();
    }

    fn unique_name(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut counter = 1;
        while self.used_names.contains(&candidate) {
            candidate = format!("{}_{}", base, counter);
            counter += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }

    fn next_rank(&mut self) -> u32 {
        let rank = self.next_rank;
        self.next_rank += 1;
        rank
    }

    // --- Construction ---

    /// The entry sentinel.
    pub fn initial(&self) -> ActivityId {
        self.initial
    }

    /// The exit sentinel.
    pub fn final_activity(&self) -> ActivityId {
        self.terminal
    }

    /// Inserts a fan-in join activity.
    pub fn add_join(&mut self) -> ActivityId {
        let name = self.unique_name("join");
        let rank = self.next_rank();
        self.graph.add_node(Activity::join(name, rank))
    }

    /// Inserts a primitive executable after resolving its signature in the
    /// catalog.
    pub fn add_primitive(
        &mut self,
        catalog: &impl PrimitiveCatalog,
        primitive: &str,
    ) -> Result<ActivityId, ProtocolError> {
        let signature = catalog
            .lookup(primitive)
            .map_err(|_| CatalogError::UnknownPrimitive(primitive.to_string()))?
            .clone();
        let name = self.unique_name(primitive);
        let rank = self.next_rank();
        Ok(self
            .graph
            .add_node(Activity::from_signature(name, signature, rank)))
    }

    /// Inserts a primitive executable and binds its inputs in one call.
    ///
    /// All bindings are checked against the signature before the activity is
    /// created, so a rejected call leaves the graph unchanged.
    pub fn execute_primitive(
        &mut self,
        catalog: &impl PrimitiveCatalog,
        primitive: &str,
        bindings: &[(&str, ParameterValue)],
    ) -> Result<ActivityId, ProtocolError> {
        let signature = catalog
            .lookup(primitive)
            .map_err(|_| CatalogError::UnknownPrimitive(primitive.to_string()))?
            .clone();

        let mut seen: HashSet<&str> = HashSet::new();
        for (port, value) in bindings {
            let input = signature.find_input(port).ok_or_else(|| {
                StructuralError::UnknownPort {
                    activity: primitive.to_string(),
                    port: port.to_string(),
                }
            })?;
            if !seen.insert(*port) {
                return Err(StructuralError::PortAlreadyBound {
                    activity: primitive.to_string(),
                    port: port.to_string(),
                }
                .into());
            }
            let found = self.value_type_of(value)?;
            if !compatible(input.value_type.as_ref(), found.as_ref()) {
                return Err(type_mismatch(port, input.value_type.as_ref(), found.as_ref()).into());
            }
        }

        let name = self.unique_name(primitive);
        let rank = self.next_rank();
        let id = self
            .graph
            .add_node(Activity::from_signature(name, signature, rank));
        for (port, value) in bindings {
            if let ParameterValue::SourcePin(source) = value {
                // Checked above; a fresh node cannot close a cycle.
                let flow = Flow {
                    source: Endpoint::Pin(source.clone()),
                    dest: Endpoint::Pin(PinRef::new(id, *port)),
                };
                self.commit_flow(flow);
            }
            self.graph[id]
                .bindings
                .insert(port.to_string(), value.clone());
        }
        Ok(id)
    }

    /// Binds a value (or another activity's output pin) to an input port.
    ///
    /// Binding a `SourcePin` also inserts the corresponding data flow.
    pub fn bind(
        &mut self,
        activity: ActivityId,
        port: &str,
        value: ParameterValue,
    ) -> Result<(), ProtocolError> {
        let act = self
            .graph
            .node_weight(activity)
            .ok_or_else(|| StructuralError::UnknownEndpoint(format!("{:?}", activity)))?;
        let input = act
            .signature()
            .and_then(|sig| sig.find_input(port))
            .ok_or_else(|| StructuralError::UnknownPort {
                activity: act.name.clone(),
                port: port.to_string(),
            })?
            .clone();
        if act.binding(port).is_some() {
            return Err(StructuralError::PortAlreadyBound {
                activity: act.name.clone(),
                port: port.to_string(),
            }
            .into());
        }

        let found = self.value_type_of(&value)?;
        if !compatible(input.value_type.as_ref(), found.as_ref()) {
            return Err(type_mismatch(port, input.value_type.as_ref(), found.as_ref()).into());
        }

        let implicit = match &value {
            ParameterValue::SourcePin(source) => Some(self.check_flow(
                Endpoint::Pin(source.clone()),
                Endpoint::Pin(PinRef::new(activity, port)),
            )?),
            _ => None,
        };

        if let Some(flow) = implicit {
            self.commit_flow(flow);
        }
        self.graph[activity].bindings.insert(port.to_string(), value);
        Ok(())
    }

    /// Inserts a directed flow between two endpoints.
    pub fn add_flow(
        &mut self,
        source: impl Into<Endpoint>,
        dest: impl Into<Endpoint>,
    ) -> Result<FlowId, ProtocolError> {
        let flow = self.check_flow(source.into(), dest.into())?;
        Ok(self.commit_flow(flow))
    }

    /// Registers a protocol-level output and the implicit flow from its
    /// source pin to `final`. The first mapping for a name always wins.
    pub fn designate_output(&mut self, name: &str, pin: PinRef) -> Result<(), ProtocolError> {
        self.resolve_pin(&pin, PinDirection::Output)?;
        if self.outputs.contains_key(name) {
            return Err(StructuralError::DuplicateOutputName(name.to_string()).into());
        }
        // Two outputs may share a source pin; only the first inserts the
        // implicit edge.
        match self.check_flow(Endpoint::Pin(pin.clone()), Endpoint::Activity(self.terminal)) {
            Ok(flow) => {
                self.commit_flow(flow);
            }
            Err(ProtocolError::Structural(StructuralError::DuplicateFlow { .. })) => {}
            Err(e) => return Err(e),
        }
        self.outputs.insert(name.to_string(), pin);
        Ok(())
    }

    // --- Temporal annotations ---

    pub fn add_time_variable(&mut self, variable: TimeVariable) -> ConstraintId {
        let id = ConstraintId::new(self.constraints.len());
        self.constraints.push(TimeConstraint::Variable(variable));
        id
    }

    pub fn add_duration(&mut self, duration: Duration) -> ConstraintId {
        let id = ConstraintId::new(self.constraints.len());
        self.constraints.push(TimeConstraint::Duration(duration));
        id
    }

    // --- Queries ---

    /// The minimum elapsed time between `initial` and `final` consistent
    /// with all flows and time constraints.
    pub fn minimum_duration(&self) -> Result<Measure, ProtocolError> {
        minimum_duration(self)
    }

    /// Every pair of temporal constraints in conflict, in one pass.
    pub fn check_consistency(&self) -> Vec<TemporalConflict> {
        check_consistency(self)
    }

    /// Runs the full validator over this protocol.
    pub fn validate(&self) -> ValidationReport {
        Validator::new(self).run()
    }

    /// Returns a topological order over all activities using Kahn's
    /// algorithm. Activities with no ordering constraint between them come
    /// out in ascending insertion order, so the result is reproducible.
    pub fn topological_order(&self) -> Result<Vec<ActivityId>, StructuralError> {
        let mut in_degree: HashMap<ActivityId, usize> = HashMap::new();
        let mut ready = BinaryHeap::new();
        for id in self.graph.node_indices() {
            let degree = self.graph.edges_directed(id, Direction::Incoming).count();
            in_degree.insert(id, degree);
            if degree == 0 {
                ready.push(Reverse((self.graph[id].rank, id)));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node);
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                let entry = in_degree.get_mut(&edge.target()).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    ready.push(Reverse((self.graph[edge.target()].rank, edge.target())));
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let stuck = self
                .graph
                .node_indices()
                .find(|id| in_degree[id] > 0)
                .map(|id| self.graph[id].name.clone())
                .unwrap_or_default();
            return Err(StructuralError::CycleDetected(stuck));
        }
        Ok(order)
    }

    /// All activities reachable from `start` by following flows forward.
    pub(crate) fn downstream_from(&self, start: ActivityId) -> HashSet<ActivityId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    fn reaches(&self, from: ActivityId, to: ActivityId) -> bool {
        self.downstream_from(from).contains(&to)
    }

    // --- Enumerable views (consumed by external serializers) ---

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.graph.node_weight(id)
    }

    pub fn activities(&self) -> impl Iterator<Item = (ActivityId, &Activity)> {
        self.graph.node_indices().map(|id| (id, &self.graph[id]))
    }

    pub fn activity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.graph.edge_weight(id)
    }

    pub fn flows(&self) -> impl Iterator<Item = (FlowId, &Flow)> {
        self.graph
            .edge_indices()
            .map(|id| (id, self.graph.edge_weight(id).unwrap()))
    }

    pub fn flow_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &PinRef)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn output(&self, name: &str) -> Option<&PinRef> {
        self.outputs.get(name)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&TimeConstraint> {
        self.constraints.get(id.index())
    }

    pub fn time_constraints(&self) -> impl Iterator<Item = (ConstraintId, &TimeConstraint)> {
        self.constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (ConstraintId::new(i), c))
    }

    /// Addresses an output pin on an activity, checking that it exists.
    pub fn output_pin(&self, activity: ActivityId, name: &str) -> Result<PinRef, ProtocolError> {
        let pin = PinRef::new(activity, name);
        self.resolve_pin(&pin, PinDirection::Output)?;
        Ok(pin)
    }

    /// Addresses an input pin on an activity, checking that it exists.
    pub fn input_pin(&self, activity: ActivityId, name: &str) -> Result<PinRef, ProtocolError> {
        let pin = PinRef::new(activity, name);
        self.resolve_pin(&pin, PinDirection::Input)?;
        Ok(pin)
    }

    // --- Internal checks ---

    pub(crate) fn resolve_pin(
        &self,
        pin: &PinRef,
        direction: PinDirection,
    ) -> Result<&Pin, ProtocolError> {
        let act = self
            .graph
            .node_weight(pin.activity)
            .ok_or_else(|| StructuralError::UnknownEndpoint(pin.to_string()))?;
        act.pin(&pin.pin)
            .filter(|p| p.direction == direction)
            .ok_or_else(|| StructuralError::UnknownEndpoint(pin.to_string()).into())
    }

    /// The resolved type tag of a bindable value (`SourcePin` values resolve
    /// through their source pin's declaration).
    pub(crate) fn value_type_of(
        &self,
        value: &ParameterValue,
    ) -> Result<Option<ValueType>, ProtocolError> {
        match value {
            ParameterValue::SourcePin(pin) => {
                Ok(self.resolve_pin(pin, PinDirection::Output)?.value_type.clone())
            }
            other => Ok(other.local_type()),
        }
    }

    /// Runs every `add_flow` precondition without mutating. The returned
    /// `Flow` is ready to commit.
    fn check_flow(&self, source: Endpoint, dest: Endpoint) -> Result<Flow, ProtocolError> {
        let source_type = match &source {
            Endpoint::Activity(id) => {
                if self.graph.node_weight(*id).is_none() {
                    return Err(StructuralError::UnknownEndpoint(format!("{:?}", id)).into());
                }
                None
            }
            Endpoint::Pin(pin) => self.resolve_pin(pin, PinDirection::Output)?.value_type.clone(),
        };
        let dest_type = match &dest {
            Endpoint::Activity(id) => {
                if self.graph.node_weight(*id).is_none() {
                    return Err(StructuralError::UnknownEndpoint(format!("{:?}", id)).into());
                }
                None
            }
            Endpoint::Pin(pin) => self.resolve_pin(pin, PinDirection::Input)?.value_type.clone(),
        };

        if !compatible(dest_type.as_ref(), source_type.as_ref()) {
            return Err(TypeError::IncompatibleEndpoints {
                src: source.to_string(),
                dest: dest.to_string(),
            }
            .into());
        }

        let src_act = source.activity();
        let dest_act = dest.activity();
        let candidate = Flow { source, dest };

        // Joins accept multiple incoming edges by design; everywhere else an
        // identical edge is a duplicate.
        if !self.graph[dest_act].is_join() {
            let duplicate = self
                .graph
                .edges_directed(dest_act, Direction::Incoming)
                .any(|e| *e.weight() == candidate);
            if duplicate {
                return Err(StructuralError::DuplicateFlow {
                    src: candidate.source.to_string(),
                    dest: candidate.dest.to_string(),
                }
                .into());
            }
        }

        if src_act == dest_act || self.reaches(dest_act, src_act) {
            return Err(
                StructuralError::CycleDetected(self.graph[src_act].name.clone()).into(),
            );
        }

        Ok(candidate)
    }

    fn commit_flow(&mut self, flow: Flow) -> FlowId {
        let (a, b) = (flow.source.activity(), flow.dest.activity());
        self.graph.add_edge(a, b, flow)
    }
}

fn type_mismatch(port: &str, expected: Option<&ValueType>, found: Option<&ValueType>) -> TypeError {
    let show = |t: Option<&ValueType>| t.map(|v| v.0.clone()).unwrap_or_else(|| "any".to_string());
    TypeError::TypeMismatch {
        port: port.to_string(),
        expected: show(expected),
        found: show(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LibraryCatalog, Signature};
    use crate::value::Measure;

    fn catalog() -> LibraryCatalog {
        let mut catalog = LibraryCatalog::new();
        catalog
            .extend(vec![
                Signature::new("EmptyContainer")
                    .input("specification", None)
                    .output("samples", Some(ValueType::from("samples"))),
                Signature::new("Provision")
                    .input("resource", None)
                    .input("destination", Some(ValueType::from("samples")))
                    .optional_input(
                        "amount",
                        Some(ValueType::from("microliter")),
                        Some(ParameterValue::Measure(Measure::new(100.0, "microliter"))),
                    )
                    .output("samples", Some(ValueType::from("samples"))),
                Signature::new("MeasureAbsorbance")
                    .input("samples", None)
                    .optional_input(
                        "wavelength",
                        Some(ValueType::from("nanometer")),
                        Some(ParameterValue::Measure(Measure::new(600.0, "nanometer"))),
                    )
                    .output("measurements", Some(ValueType::from("measurements"))),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn test_empty_protocol_topological_order() {
        let protocol = Protocol::new("empty");
        let order = protocol.topological_order().unwrap();
        assert_eq!(order, vec![protocol.initial(), protocol.final_activity()]);
    }

    #[test]
    fn test_isolated_activities_sort_in_insertion_order() {
        let mut protocol = Protocol::new("isolated");
        let j1 = protocol.add_join();
        let j2 = protocol.add_join();
        let order = protocol.topological_order().unwrap();
        assert_eq!(
            order,
            vec![protocol.initial(), protocol.final_activity(), j1, j2]
        );
    }

    #[test]
    fn test_unknown_primitive() {
        let mut protocol = Protocol::new("p");
        let err = protocol.add_primitive(&catalog(), "Centrifuge").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Catalog(CatalogError::UnknownPrimitive("Centrifuge".into()))
        );
    }

    #[test]
    fn test_activity_names_are_uniquified() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let a = protocol.add_primitive(&catalog, "Provision").unwrap();
        let b = protocol.add_primitive(&catalog, "Provision").unwrap();
        assert_eq!(protocol.activity(a).unwrap().name, "Provision");
        assert_eq!(protocol.activity(b).unwrap().name, "Provision_1");
    }

    #[test]
    fn test_flow_to_unknown_pin_is_rejected() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let plate = protocol.add_primitive(&catalog, "EmptyContainer").unwrap();
        let err = protocol
            .add_flow(PinRef::new(plate, "wells"), protocol.final_activity())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Structural(StructuralError::UnknownEndpoint(_))
        ));
        assert_eq!(protocol.flow_count(), 0);
    }

    #[test]
    fn test_incompatible_pin_types_are_rejected() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let plate = protocol.add_primitive(&catalog, "EmptyContainer").unwrap();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        // samples -> amount: "samples" vs "microliter".
        let err = protocol
            .add_flow(PinRef::new(plate, "samples"), PinRef::new(step, "amount"))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Type(TypeError::IncompatibleEndpoints { .. })
        ));
        assert_eq!(protocol.flow_count(), 0);
    }

    #[test]
    fn test_duplicate_flow_rejected_for_plain_destination() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        protocol.add_flow(protocol.initial(), step).unwrap();
        let err = protocol.add_flow(protocol.initial(), step).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Structural(StructuralError::DuplicateFlow { .. })
        ));
        assert_eq!(protocol.flow_count(), 1);
    }

    #[test]
    fn test_join_accepts_parallel_incoming_flows() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let a = protocol.add_primitive(&catalog, "Provision").unwrap();
        let b = protocol.add_primitive(&catalog, "Provision").unwrap();
        let join = protocol.add_join();
        protocol
            .add_flow(PinRef::new(a, "samples"), join)
            .unwrap();
        protocol
            .add_flow(PinRef::new(b, "samples"), join)
            .unwrap();
        // Even an identical edge is tolerated at a join.
        protocol
            .add_flow(PinRef::new(a, "samples"), join)
            .unwrap();
        assert_eq!(protocol.flow_count(), 3);
    }

    #[test]
    fn test_cycle_insertion_fails_and_leaves_edges_unchanged() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let a = protocol.add_primitive(&catalog, "Provision").unwrap();
        let b = protocol.add_primitive(&catalog, "Provision").unwrap();
        protocol.add_flow(a, b).unwrap();

        let err = protocol.add_flow(b, a).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Structural(StructuralError::CycleDetected(_))
        ));
        assert_eq!(protocol.flow_count(), 1);
        assert!(protocol.topological_order().is_ok());

        let self_loop = protocol.add_flow(a, a).unwrap_err();
        assert!(matches!(
            self_loop,
            ProtocolError::Structural(StructuralError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_bind_unknown_port() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        let err = protocol
            .bind(step, "speed", ParameterValue::Literal("fast".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Structural(StructuralError::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_bind_type_mismatch() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        let err = protocol
            .bind(
                step,
                "amount",
                ParameterValue::Measure(Measure::new(10.0, "hour")),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Type(TypeError::TypeMismatch {
                port: "amount".into(),
                expected: "microliter".into(),
                found: "hour".into(),
            })
        );
    }

    #[test]
    fn test_rebinding_a_port_is_rejected() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        protocol
            .bind(step, "resource", ParameterValue::Literal("ludox".into()))
            .unwrap();
        let err = protocol
            .bind(step, "resource", ParameterValue::Literal("water".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Structural(StructuralError::PortAlreadyBound { .. })
        ));
        assert_eq!(
            protocol.activity(step).unwrap().binding("resource"),
            Some(&ParameterValue::Literal("ludox".into()))
        );
    }

    #[test]
    fn test_binding_a_source_pin_inserts_the_data_flow() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let plate = protocol.add_primitive(&catalog, "EmptyContainer").unwrap();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        let source = protocol.output_pin(plate, "samples").unwrap();
        protocol
            .bind(step, "destination", ParameterValue::SourcePin(source))
            .unwrap();
        assert_eq!(protocol.flow_count(), 1);
        let order = protocol.topological_order().unwrap();
        let pos = |id| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(plate) < pos(step));
    }

    #[test]
    fn test_execute_primitive_is_atomic() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let before = protocol.activity_count();
        let err = protocol
            .execute_primitive(
                &catalog,
                "Provision",
                &[
                    ("resource", ParameterValue::Literal("ludox".into())),
                    ("amount", ParameterValue::Measure(Measure::new(1.0, "hour"))),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Type(TypeError::TypeMismatch { .. })));
        assert_eq!(protocol.activity_count(), before);
        assert_eq!(protocol.flow_count(), 0);
    }

    #[test]
    fn test_designate_output_restores_reachability_of_final() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let measure = protocol.add_primitive(&catalog, "MeasureAbsorbance").unwrap();
        assert!(!protocol.downstream_from(measure).contains(&protocol.final_activity()));

        let pin = protocol.output_pin(measure, "measurements").unwrap();
        protocol.designate_output("absorbance", pin).unwrap();
        assert!(protocol.downstream_from(measure).contains(&protocol.final_activity()));
    }

    #[test]
    fn test_duplicate_output_name_keeps_first_mapping() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let a = protocol.add_primitive(&catalog, "MeasureAbsorbance").unwrap();
        let b = protocol.add_primitive(&catalog, "MeasureAbsorbance").unwrap();
        let first = protocol.output_pin(a, "measurements").unwrap();
        let second = protocol.output_pin(b, "measurements").unwrap();

        protocol.designate_output("result", first.clone()).unwrap();
        let err = protocol.designate_output("result", second).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Structural(StructuralError::DuplicateOutputName("result".into()))
        );
        assert_eq!(protocol.output("result"), Some(&first));
    }

    #[test]
    fn test_two_outputs_may_share_a_source_pin() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let a = protocol.add_primitive(&catalog, "MeasureAbsorbance").unwrap();
        let pin = protocol.output_pin(a, "measurements").unwrap();
        protocol.designate_output("raw", pin.clone()).unwrap();
        protocol.designate_output("calibrated", pin).unwrap();
        // The implicit edge to `final` is inserted once.
        assert_eq!(protocol.flow_count(), 1);
        assert_eq!(protocol.outputs().count(), 2);
    }

    #[test]
    fn test_serialized_view_round_trips() {
        let mut protocol = Protocol::new("p");
        let catalog = catalog();
        let step = protocol.add_primitive(&catalog, "Provision").unwrap();
        protocol.add_flow(protocol.initial(), step).unwrap();

        let json = serde_json::to_string(&protocol).unwrap();
        let mut restored: Protocol = serde_json::from_str(&json).unwrap();
        restored.rebuild_name_cache();

        assert_eq!(restored.activity_count(), 3);
        assert_eq!(restored.flow_count(), 1);
        // The name cache works after the rebuild.
        let again = restored.add_primitive(&catalog, "Provision").unwrap();
        assert_eq!(restored.activity(again).unwrap().name, "Provision_1");
    }
}
