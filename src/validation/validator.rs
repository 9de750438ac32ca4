//! The central validator that orchestrates the execution of all validation
//! rules.
//!
//! Unlike construction calls, validation never fails fast: every detected
//! problem lands in the returned report so an author sees the full picture
//! in one pass. The validator never mutates the graph.

use tracing::debug;

use super::report::{IssueKind, ValidationReport};
use super::rules::{bindings, structural};
use crate::graph::Protocol;
use crate::temporal::{check_consistency, dangling_references};

/// The orchestrator for the static analysis of a protocol.
pub struct Validator<'a> {
    protocol: &'a Protocol,
}

impl<'a> Validator<'a> {
    pub fn new(protocol: &'a Protocol) -> Self {
        Self { protocol }
    }

    /// Runs, in order: structural checks, binding checks, acyclicity, and
    /// (when any time constraint exists) temporal consistency.
    pub fn run(&self) -> ValidationReport {
        debug!(protocol = %self.protocol.name, "validating protocol");
        let mut report = ValidationReport::new();

        structural::check_flow_endpoints(self.protocol, &mut report);
        structural::check_reachability(self.protocol, &mut report);
        structural::check_output_reachability(self.protocol, &mut report);
        structural::check_dead_ends(self.protocol, &mut report);

        bindings::check_bindings(self.protocol, &mut report);

        if let Err(e) = self.protocol.topological_order() {
            report.error(IssueKind::Cycle, None, e.to_string());
        }

        if self.protocol.time_constraints().next().is_some() {
            for (_, name) in dangling_references(self.protocol) {
                report.error(
                    IssueKind::DanglingTime,
                    None,
                    format!(
                        "time constraint '{}' refers to an element outside this protocol",
                        name
                    ),
                );
            }
            for conflict in check_consistency(self.protocol) {
                report.error(IssueKind::Temporal, None, conflict.message);
            }
        }

        debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validation finished"
        );
        report
    }
}
