//! The pluggable per-protocol implementation contract.
//!
//! A [`NodeImp`] value teaches the node graph how to speak one protocol: how
//! to fuse a negotiated pair of parameters into an edge, how to materialize a
//! wire bundle for an edge, and how to physically connect the two halves of a
//! binding once elaboration has resolved it. The graph core never inspects the
//! four carried types; it only routes them between nodes.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use crate::node::BaseNode;

/// A shared, mutable handle to one port's wire bundle.
///
/// Handles are shared rather than copied so that shapes which alias one
/// bundle side to the other expose the *same* underlying bundles through
/// both accessors.
pub type BundleRef<B> = Rc<RefCell<B>>;

/// A deferred zero-argument action that physically wires bundles together.
pub type WireFn = Box<dyn FnOnce()>;

/// The implementation contract a protocol provides to the node graph.
///
/// The four associated types are fully opaque to the graph core:
///
/// * `D` is the downward parameter, flowing from sources toward sinks.
/// * `U` is the upward parameter, flowing from sinks toward sources.
/// * `E` is the fused `(D, U)` contract for one resolved port.
/// * `B` is the wire-level bundle for one resolved port.
///
/// Homogeneous nodes reuse one imp value on both sides; heterogeneous nodes
/// (adapters between protocols) carry one imp per side.
pub trait NodeImp: 'static {
    /// Configuration flowing from source toward sink.
    type D: Clone + 'static;
    /// Constraints flowing from sink toward source.
    type U: Clone + 'static;
    /// The negotiated contract for one port.
    type E: Clone + 'static;
    /// The wire-level connection value for one port.
    type B: 'static;

    /// Fuses a negotiated parameter pair into an edge descriptor.
    fn edge(&self, d: Self::D, u: Self::U) -> Self::E;

    /// Constructs a fresh wire bundle for an edge.
    fn bundle(&self, e: &Self::E) -> Self::B;

    /// Annotates a downward parameter with the node it flows out of.
    fn mix_o(&self, d: Self::D, node: &dyn BaseNode) -> Self::D {
        let _ = node;
        d
    }

    /// Annotates an upward parameter with the node it flows in through.
    fn mix_i(&self, u: Self::U, node: &dyn BaseNode) -> Self::U {
        let _ = node;
        u
    }

    /// For a one-port node, the most common neighbour reachable through an
    /// upward parameter, if the protocol can name one.
    fn common_o(&self, u: &Self::U) -> Option<Rc<dyn BaseNode>> {
        let _ = u;
        None
    }

    /// For a one-port node, the most common neighbour reachable through a
    /// downward parameter, if the protocol can name one.
    fn common_i(&self, d: &Self::D) -> Option<Rc<dyn BaseNode>> {
        let _ = d;
        None
    }

    /// A short description of an edge, used when emitting a graph.
    fn label(&self, e: &Self::E) -> String {
        let _ = e;
        String::new()
    }

    /// The colour used when drawing this protocol's edges.
    fn colour(&self) -> String {
        "#000000".to_owned()
    }

    /// Whether this protocol's edges are drawn against the direction of flow.
    fn reverse(&self) -> bool {
        false
    }

    /// Connects the two halves of one resolved binding.
    ///
    /// `edges` holds the negotiated contract for each port of the binding and
    /// `bundles` the corresponding `(sink, source)` bundle handles. When
    /// `monitored` is set the implementation may construct a protocol monitor,
    /// returned type-erased for the enclosing system to collect. The returned
    /// action performs the physical wiring and runs after every binding of the
    /// scope has been resolved.
    fn connect(
        &self,
        edges: &[Self::E],
        bundles: &[(BundleRef<Self::B>, BundleRef<Self::B>)],
        monitored: bool,
    ) -> (Option<Box<dyn Any>>, WireFn) {
        let _ = (edges, bundles, monitored);
        (None, Box::new(|| {}))
    }
}

/// An opaque source location, carried by pushes and used solely in
/// diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    location: &'static Location<'static>,
}

impl SourceInfo {
    /// Captures the caller's source location.
    #[track_caller]
    pub fn caller() -> Self {
        SourceInfo {
            location: Location::caller(),
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}
