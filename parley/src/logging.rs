//! Types and aliases for logging graph elaboration events.

use serde::{Deserialize, Serialize};

use crate::node::BindKind;

/// Logger for graph elaboration events.
pub type GraphLogger = parley_logging::Logger<GraphEvent>;

/// The name of the log stream carrying [`GraphEvent`]s.
pub const GRAPH_LOG: &str = "parley";

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
/// The creation of a node.
pub struct NodeEvent {
    /// Elaboration-unique identifier for the node.
    pub id: usize,
    /// Path of the enclosing scope.
    pub scope: String,
    /// The node's name within its scope.
    pub name: String,
    /// The shape tag of the node's policy.
    pub shape: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
/// The recording of a binding between two nodes.
pub struct BindEvent {
    /// Elaboration-unique identifier for the binding.
    pub id: usize,
    /// Identifier of the consuming node.
    pub sink: usize,
    /// Identifier of the producing node.
    pub source: usize,
    /// The tag recorded on the sink side.
    pub kind: BindKind,
    /// Whether the binding will construct a monitor when wired.
    pub monitored: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
/// The completion of star resolution at a node.
pub struct ResolveEvent {
    /// Identifier of the resolved node.
    pub id: usize,
    /// The resolved inward star width.
    pub i_star: usize,
    /// The resolved outward star width.
    pub o_star: usize,
    /// The resolved inward port total.
    pub inward: usize,
    /// The resolved outward port total.
    pub outward: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
/// The application of one deferred wiring action.
pub struct WireEvent {
    /// Identifier of the binding that registered the action.
    pub id: usize,
    /// The number of ports the binding resolved to.
    pub ports: usize,
    /// Whether a monitor was constructed.
    pub monitored: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
/// An event in the elaboration of a node graph.
pub enum GraphEvent {
    /// Node creation.
    Node(NodeEvent),
    /// Binding recorded.
    Bind(BindEvent),
    /// Star resolution finished at a node.
    Resolve(ResolveEvent),
    /// Deferred wiring action applied.
    Wire(WireEvent),
}

impl From<NodeEvent> for GraphEvent {
    fn from(v: NodeEvent) -> GraphEvent {
        GraphEvent::Node(v)
    }
}

impl From<BindEvent> for GraphEvent {
    fn from(v: BindEvent) -> GraphEvent {
        GraphEvent::Bind(v)
    }
}

impl From<ResolveEvent> for GraphEvent {
    fn from(v: ResolveEvent) -> GraphEvent {
        GraphEvent::Resolve(v)
    }
}

impl From<WireEvent> for GraphEvent {
    fn from(v: WireEvent) -> GraphEvent {
        GraphEvent::Wire(v)
    }
}
