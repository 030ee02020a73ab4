//! Router: the workflow's transition function.
//!
//! `route` picks the node to run from the state alone; `after_node` decides
//! whether the turn keeps going once that node has run. Both are pure.

use std::fmt;

use crate::workflow::state::{PlanStatus, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    ValidatePosition,
    ValidateCv,
    GeneratePlan,
    RefinePlan,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::ValidatePosition => "validate_position",
            NodeId::ValidateCv => "validate_cv",
            NodeId::GeneratePlan => "generate_plan",
            NodeId::RefinePlan => "refine_plan",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine does after a node completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Re-route within the same turn.
    Continue,
    /// Return control to the caller and wait for the next user input.
    Suspend,
}

type Predicate = fn(&WorkflowState) -> bool;

fn position_invalid(state: &WorkflowState) -> bool {
    !state.position_valid
}

fn cv_invalid(state: &WorkflowState) -> bool {
    !state.cv_valid
}

fn plan_present(state: &WorkflowState) -> bool {
    state.status == PlanStatus::Generated || state.has_plan()
}

fn always(_: &WorkflowState) -> bool {
    true
}

/// Evaluated top to bottom, first match wins. The final row is unconditional,
/// so every state routes somewhere.
const ROUTING_TABLE: &[(Predicate, NodeId)] = &[
    (position_invalid, NodeId::ValidatePosition),
    (cv_invalid, NodeId::ValidateCv),
    (plan_present, NodeId::RefinePlan),
    (always, NodeId::GeneratePlan),
];

pub fn route(state: &WorkflowState) -> NodeId {
    ROUTING_TABLE
        .iter()
        .find(|(matches, _)| matches(state))
        .map(|(_, node)| *node)
        .unwrap_or(NodeId::GeneratePlan)
}

pub fn after_node(node: NodeId, state: &WorkflowState) -> Transition {
    let still_invalid = match node {
        NodeId::ValidatePosition => !state.position_valid,
        NodeId::ValidateCv => !state.cv_valid,
        NodeId::GeneratePlan | NodeId::RefinePlan => return Transition::Suspend,
    };

    // A freshly validated input never triggers a refinement in the same turn:
    // the user's message was the correction, not plan feedback.
    if still_invalid || state.has_plan() {
        Transition::Suspend
    } else {
        Transition::Continue
    }
}
