//! The node base: identity, scope registration, and the push-list discipline.
//!
//! A node is one statically sized module in the graph under elaboration. User
//! code records *bindings* between node handles with the [`Bind`] operators;
//! each binding appends to a push list on both nodes.
//! The first observation of any derived field (star widths, port mappings,
//! parameters, edges, bundles) freezes the node's push lists and triggers
//! one-shot resolution, which pulls on neighbours as needed.
//!
//! Nodes are heterogeneous: a [`MixedNode`] speaks one protocol on its inward
//! side and possibly another on its outward side. The shape of a node (an
//! adapter, a nexus, a source) is a [`NodePolicy`] installed at construction;
//! the catalog of shapes lives in [`shapes`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{self, ErrorKind};
use crate::imp::{BundleRef, NodeImp, SourceInfo};
use crate::logging::{GraphLogger, NodeEvent};
use crate::scope::{Elaborator, Scope};

mod bind;
mod resolve;
pub mod shapes;

pub use bind::Bind;

/// The flavour of a single recorded binding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BindKind {
    /// Exactly one connection.
    Once,
    /// A binding whose width is this node's resolved star width.
    Star,
    /// The mirrored view of a peer's star binding; the peer chooses the width.
    Query,
}

impl BindKind {
    /// The tag recorded on the peer for a binding recorded as `self`.
    pub fn mirror(self) -> Self {
        match self {
            BindKind::Once => BindKind::Once,
            BindKind::Star => BindKind::Query,
            BindKind::Query => BindKind::Star,
        }
    }
}

/// Bundle-visibility and materialization flags fixed by a node's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeFlags {
    /// Whether the inward bundles are visible outside the enclosing module.
    pub external_in: bool,
    /// Whether the outward bundles are visible outside the enclosing module.
    pub external_out: bool,
    /// Whether the bundle sequences swap logical direction, exposing the
    /// opposite side externally.
    pub flip: bool,
    /// Whether bundles materialize as free wires rather than module ports.
    pub wire: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags {
            external_in: true,
            external_out: true,
            flip: false,
            wire: false,
        }
    }
}

/// Cosmetics for one resolved port, used when emitting a graph.
#[derive(Clone, Debug)]
pub struct RenderedEdge {
    /// The protocol's description of the edge.
    pub label: String,
    /// The colour used when drawing the edge.
    pub colour: String,
    /// Whether the edge is drawn against the direction of flow.
    pub flipped: bool,
}

/// Type-erased access to a node, for diagnostics and graph reasoning.
pub trait BaseNode {
    /// The node's name within its scope.
    fn name(&self) -> &str;
    /// The node's stable index within its scope.
    fn index(&self) -> usize;
    /// The node's elaboration-unique identifier.
    fn ident(&self) -> usize;
    /// The shape tag of the node's policy.
    fn shape(&self) -> &'static str;
    /// The node's qualified name: the scope path joined with the node name.
    fn path(&self) -> &str;
    /// Bundle-visibility and materialization flags.
    fn flags(&self) -> NodeFlags;
    /// Resolved inward ports as `(peer, cosmetics)` pairs, in port order.
    fn inputs(&self) -> Vec<(Rc<dyn BaseNode>, RenderedEdge)>;
    /// Resolved outward ports as `(peer, cosmetics)` pairs, in port order.
    fn outputs(&self) -> Vec<(Rc<dyn BaseNode>, RenderedEdge)>;
    /// True when the node has neither inputs nor outputs, and so would add
    /// nothing to an emitted graph.
    fn omit_graphml(&self) -> bool {
        self.inputs().is_empty() && self.outputs().is_empty()
    }
}

/// The sink-facing half of a node: operations reachable through an inward
/// imp `I`.
pub trait InwardNode<I: NodeImp>: BaseNode {
    /// Records an inward binding from `peer`, whose own record of this
    /// binding sits at `peer_binding` in its outward list. Returns the index
    /// assigned on this side.
    ///
    /// Not normally called directly; the binding operators push on both
    /// sides with mirrored tags.
    fn i_push(
        &self,
        peer_binding: usize,
        peer: Rc<dyn OutwardNode<I>>,
        kind: BindKind,
        info: SourceInfo,
    ) -> usize;
    /// The number of inward bindings recorded so far.
    fn i_recorded(&self) -> usize;
    /// The resolved inward star width.
    fn i_star(&self) -> usize;
    /// The half-open inward port range of binding `binding`.
    fn i_ports_of(&self, binding: usize) -> Range<usize>;
    /// One upward parameter per resolved inward port.
    fn i_params(&self) -> Rc<Vec<I::U>>;
    /// One negotiated edge per resolved inward port.
    fn edges_in(&self) -> Rc<Vec<I::E>>;
    /// One bundle handle per resolved inward port.
    fn bundle_in(&self) -> Vec<BundleRef<I::B>>;
}

/// The source-facing half of a node: operations reachable through an outward
/// imp `O`.
pub trait OutwardNode<O: NodeImp>: BaseNode {
    /// Records an outward binding toward `peer`, whose own record of this
    /// binding sits at `peer_binding` in its inward list. Returns the index
    /// assigned on this side.
    ///
    /// Not normally called directly; the binding operators push on both
    /// sides with mirrored tags.
    fn o_push(
        &self,
        peer_binding: usize,
        peer: Rc<dyn InwardNode<O>>,
        kind: BindKind,
        info: SourceInfo,
    ) -> usize;
    /// The number of outward bindings recorded so far.
    fn o_recorded(&self) -> usize;
    /// The resolved outward star width.
    fn o_star(&self) -> usize;
    /// The half-open outward port range of binding `binding`.
    fn o_ports_of(&self, binding: usize) -> Range<usize>;
    /// One downward parameter per resolved outward port.
    fn o_params(&self) -> Rc<Vec<O::D>>;
    /// One negotiated edge per resolved outward port.
    fn edges_out(&self) -> Rc<Vec<O::E>>;
    /// One bundle handle per resolved outward port.
    fn bundle_out(&self) -> Vec<BundleRef<O::B>>;
}

/// Star-resolution context handed to a policy.
pub struct StarCx<'a> {
    /// The node being resolved.
    pub node: &'a dyn BaseNode,
    /// Summed widths of the non-star inward bindings.
    pub i_known: usize,
    /// Summed widths of the non-star outward bindings.
    pub o_known: usize,
    /// The number of inward star bindings.
    pub i_stars: usize,
    /// The number of outward star bindings.
    pub o_stars: usize,
    /// Push site of the first inward star binding, when any.
    pub i_star_site: Option<SourceInfo>,
    /// Push site of the first outward star binding, when any.
    pub o_star_site: Option<SourceInfo>,
}

impl StarCx<'_> {
    /// Reports a star-resolution failure at this node.
    pub fn fail(&self, kind: ErrorKind, detail: impl fmt::Display) -> ! {
        error::fail(
            kind,
            self.node.path(),
            detail,
            self.i_star_site.or(self.o_star_site),
        )
    }
}

/// The per-shape policy installed in a [`MixedNode`] at construction.
///
/// A policy fixes how the node resolves star widths, how parameters map
/// across it, its acceptance ranges, its visibility flags, and how its
/// bundles materialize. The catalog in [`shapes`] provides the stock
/// policies.
pub trait NodePolicy<I: NodeImp, O: NodeImp>: 'static {
    /// A short tag naming the shape, used in diagnostics and log events.
    fn shape(&self) -> &'static str;

    /// Chooses `(i_star, o_star)` for the node from the observed widths.
    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize);

    /// Maps the collected incoming downward parameters to `n` outgoing ones.
    fn map_params_d(&self, node: &dyn BaseNode, n: usize, incoming: Vec<I::D>) -> Vec<O::D>;

    /// Maps the collected incoming upward parameters to `n` outgoing ones.
    fn map_params_u(&self, node: &dyn BaseNode, n: usize, incoming: Vec<O::U>) -> Vec<I::U>;

    /// The acceptance range for the resolved inward port total.
    fn num_pi(&self) -> RangeInclusive<usize> {
        0..=usize::MAX
    }

    /// The acceptance range for the resolved outward port total.
    fn num_po(&self) -> RangeInclusive<usize> {
        0..=usize::MAX
    }

    /// The shape's visibility and materialization flags.
    fn flags(&self) -> NodeFlags {
        NodeFlags::default()
    }

    /// Whether the inward bundle side exists for this shape.
    fn bundle_in_allowed(&self) -> bool {
        true
    }

    /// Whether the outward bundle side exists for this shape.
    fn bundle_out_allowed(&self) -> bool {
        true
    }

    /// Materializes the bundle sequences for both sides.
    ///
    /// The default builds one fresh bundle per edge through the imps; shapes
    /// that alias one side to the other override this and return shared
    /// handles instead.
    fn bundles(
        &self,
        imp_i: &I,
        imp_o: &O,
        edges_in: &[I::E],
        edges_out: &[O::E],
    ) -> (Vec<BundleRef<I::B>>, Vec<BundleRef<O::B>>) {
        (
            edges_in
                .iter()
                .map(|e| Rc::new(RefCell::new(imp_i.bundle(e))))
                .collect(),
            edges_out
                .iter()
                .map(|e| Rc::new(RefCell::new(imp_o.bundle(e))))
                .collect(),
        )
    }
}

/// One recorded inward binding.
struct InBinding<I: NodeImp> {
    /// Index of this binding in the peer's outward list.
    peer_binding: usize,
    peer: Rc<dyn OutwardNode<I>>,
    kind: BindKind,
    info: SourceInfo,
}

/// One recorded outward binding.
struct OutBinding<O: NodeImp> {
    /// Index of this binding in the peer's inward list.
    peer_binding: usize,
    peer: Rc<dyn InwardNode<O>>,
    kind: BindKind,
    info: SourceInfo,
}

/// The node base: identity, push lists, and lazily resolved derived state.
///
/// `I` is the protocol spoken on the inward (sink-facing) side and `O` the
/// protocol on the outward (source-facing) side; homogeneous nodes use the
/// same imp for both.
pub struct MixedNode<I: NodeImp, O: NodeImp> {
    imp_i: I,
    imp_o: O,
    policy: Box<dyn NodePolicy<I, O>>,
    name: String,
    qualified: String,
    index: usize,
    ident: usize,
    scope: Rc<Scope>,
    logging: Option<GraphLogger>,
    num_pi: RangeInclusive<usize>,
    num_po: RangeInclusive<usize>,
    flags: NodeFlags,

    i_bindings: RefCell<SmallVec<[InBinding<I>; 4]>>,
    o_bindings: RefCell<SmallVec<[OutBinding<O>; 4]>>,
    i_frozen: Cell<bool>,
    o_frozen: Cell<bool>,

    // Lazily resolved state; see `resolve`.
    stars: Cell<Option<(usize, usize)>>,
    i_mapping: RefCell<Option<Rc<Vec<Range<usize>>>>>,
    o_mapping: RefCell<Option<Rc<Vec<Range<usize>>>>>,
    i_params: RefCell<Option<Rc<Vec<I::U>>>>,
    o_params: RefCell<Option<Rc<Vec<O::D>>>>,
    edges_in: RefCell<Option<Rc<Vec<I::E>>>>,
    edges_out: RefCell<Option<Rc<Vec<O::E>>>>,
    bundles_in: RefCell<Option<Vec<BundleRef<I::B>>>>,
    bundles_out: RefCell<Option<Vec<BundleRef<O::B>>>>,
    resolving_stars: Cell<bool>,
    resolving_i: Cell<bool>,
    resolving_o: Cell<bool>,
}

impl<I: NodeImp, O: NodeImp> MixedNode<I, O> {
    /// Creates a node with the given policy inside the active scope.
    ///
    /// The node registers itself with the scope and captures the scope's
    /// graph logger, if one is installed. Fails with `OutOfScope` when no
    /// scope is active.
    #[track_caller]
    pub fn new(
        elab: &Elaborator,
        name: &str,
        imp_i: I,
        imp_o: O,
        policy: Box<dyn NodePolicy<I, O>>,
    ) -> Rc<Self> {
        let info = SourceInfo::caller();
        let scope = elab.current().unwrap_or_else(|| {
            error::fail(
                ErrorKind::OutOfScope,
                name,
                "node constructed outside any scope",
                Some(info),
            )
        });
        let ident = elab.inner.next_identifier();
        let logging = elab.inner.logging();
        let index = scope.allocate_index();
        let qualified = format!("{}.{}", scope.path(), name);
        let num_pi = policy.num_pi();
        let num_po = policy.num_po();
        let flags = policy.flags();

        if let Some(logger) = &logging {
            logger.log(
                NodeEvent {
                    id: ident,
                    scope: scope.path().to_owned(),
                    name: name.to_owned(),
                    shape: policy.shape().to_owned(),
                }
                .into(),
            );
        }

        let node = Rc::new(MixedNode {
            imp_i,
            imp_o,
            policy,
            name: name.to_owned(),
            qualified,
            index,
            ident,
            scope: Rc::clone(&scope),
            logging,
            num_pi,
            num_po,
            flags,
            i_bindings: RefCell::new(SmallVec::new()),
            o_bindings: RefCell::new(SmallVec::new()),
            i_frozen: Cell::new(false),
            o_frozen: Cell::new(false),
            stars: Cell::new(None),
            i_mapping: RefCell::new(None),
            o_mapping: RefCell::new(None),
            i_params: RefCell::new(None),
            o_params: RefCell::new(None),
            edges_in: RefCell::new(None),
            edges_out: RefCell::new(None),
            bundles_in: RefCell::new(None),
            bundles_out: RefCell::new(None),
            resolving_stars: Cell::new(false),
            resolving_i: Cell::new(false),
            resolving_o: Cell::new(false),
        });
        scope.register_node(Rc::clone(&node) as Rc<dyn BaseNode>);
        node
    }

    /// The protocol imp of the inward side.
    pub fn inner(&self) -> &I {
        &self.imp_i
    }

    /// The protocol imp of the outward side.
    pub fn outer(&self) -> &O {
        &self.imp_o
    }

    /// The scope the node was constructed in.
    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    /// The elaboration this node belongs to; fails if it has ended.
    pub(crate) fn scope_elab(&self, info: SourceInfo) -> Rc<crate::scope::ElabInner> {
        self.scope.elab().unwrap_or_else(|| {
            error::fail(
                ErrorKind::OutOfScope,
                &self.qualified,
                "binding recorded after its elaboration ended",
                Some(info),
            )
        })
    }

    /// The graph logger captured at construction, if any.
    pub(crate) fn logger(&self) -> Option<&GraphLogger> {
        self.logging.as_ref()
    }

    /// Checks the push gates common to both sides.
    fn check_push(&self, frozen: &Cell<bool>, info: SourceInfo, side: &str) {
        let in_scope = self
            .scope
            .elab()
            .is_some_and(|elab| elab.current().is_some());
        if !in_scope {
            error::fail(
                ErrorKind::OutOfScope,
                &self.qualified,
                format_args!("{side} binding recorded outside any scope"),
                Some(info),
            );
        }
        if frozen.get() {
            error::fail(
                ErrorKind::Frozen,
                &self.qualified,
                format_args!("{side} binding arrives after the {side} side was observed"),
                Some(info),
            );
        }
    }
}

impl<I: NodeImp, O: NodeImp> BaseNode for MixedNode<I, O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> usize {
        self.index
    }

    fn ident(&self) -> usize {
        self.ident
    }

    fn shape(&self) -> &'static str {
        self.policy.shape()
    }

    fn path(&self) -> &str {
        &self.qualified
    }

    fn flags(&self) -> NodeFlags {
        self.flags
    }

    fn inputs(&self) -> Vec<(Rc<dyn BaseNode>, RenderedEdge)> {
        let edges = self.edges_in();
        let mapping = self.i_port_mapping();
        let bindings = self.i_bindings.borrow();
        let mut ports = Vec::with_capacity(edges.len());
        for (binding, record) in bindings.iter().enumerate() {
            let peer = Rc::clone(&record.peer) as Rc<dyn BaseNode>;
            for port in mapping[binding].clone() {
                ports.push((
                    Rc::clone(&peer),
                    RenderedEdge {
                        label: self.imp_i.label(&edges[port]),
                        colour: self.imp_i.colour(),
                        flipped: self.imp_i.reverse(),
                    },
                ));
            }
        }
        ports
    }

    fn outputs(&self) -> Vec<(Rc<dyn BaseNode>, RenderedEdge)> {
        let edges = self.edges_out();
        let mapping = self.o_port_mapping();
        let bindings = self.o_bindings.borrow();
        let mut ports = Vec::with_capacity(edges.len());
        for (binding, record) in bindings.iter().enumerate() {
            let peer = Rc::clone(&record.peer) as Rc<dyn BaseNode>;
            for port in mapping[binding].clone() {
                ports.push((
                    Rc::clone(&peer),
                    RenderedEdge {
                        label: self.imp_o.label(&edges[port]),
                        colour: self.imp_o.colour(),
                        flipped: self.imp_o.reverse(),
                    },
                ));
            }
        }
        ports
    }
}

impl<I: NodeImp, O: NodeImp> InwardNode<I> for MixedNode<I, O> {
    fn i_push(
        &self,
        peer_binding: usize,
        peer: Rc<dyn OutwardNode<I>>,
        kind: BindKind,
        info: SourceInfo,
    ) -> usize {
        self.check_push(&self.i_frozen, info, "inward");
        if *self.num_pi.start() == 0 && *self.num_pi.end() == 0 {
            error::fail(
                ErrorKind::NotASink,
                &self.qualified,
                format_args!("{} nodes accept no inward bindings", self.policy.shape()),
                Some(info),
            );
        }
        let mut bindings = self.i_bindings.borrow_mut();
        let index = bindings.len();
        bindings.push(InBinding {
            peer_binding,
            peer,
            kind,
            info,
        });
        index
    }

    fn i_recorded(&self) -> usize {
        self.i_bindings.borrow().len()
    }

    fn i_star(&self) -> usize {
        MixedNode::i_star(self)
    }

    fn i_ports_of(&self, binding: usize) -> Range<usize> {
        MixedNode::i_ports_of(self, binding)
    }

    fn i_params(&self) -> Rc<Vec<I::U>> {
        MixedNode::i_params(self)
    }

    fn edges_in(&self) -> Rc<Vec<I::E>> {
        MixedNode::edges_in(self)
    }

    fn bundle_in(&self) -> Vec<BundleRef<I::B>> {
        MixedNode::bundle_in(self)
    }
}

impl<I: NodeImp, O: NodeImp> OutwardNode<O> for MixedNode<I, O> {
    fn o_push(
        &self,
        peer_binding: usize,
        peer: Rc<dyn InwardNode<O>>,
        kind: BindKind,
        info: SourceInfo,
    ) -> usize {
        self.check_push(&self.o_frozen, info, "outward");
        if *self.num_po.start() == 0 && *self.num_po.end() == 0 {
            error::fail(
                ErrorKind::NotASource,
                &self.qualified,
                format_args!("{} nodes accept no outward bindings", self.policy.shape()),
                Some(info),
            );
        }
        let mut bindings = self.o_bindings.borrow_mut();
        let index = bindings.len();
        bindings.push(OutBinding {
            peer_binding,
            peer,
            kind,
            info,
        });
        index
    }

    fn o_recorded(&self) -> usize {
        self.o_bindings.borrow().len()
    }

    fn o_star(&self) -> usize {
        MixedNode::o_star(self)
    }

    fn o_ports_of(&self, binding: usize) -> Range<usize> {
        MixedNode::o_ports_of(self, binding)
    }

    fn o_params(&self) -> Rc<Vec<O::D>> {
        MixedNode::o_params(self)
    }

    fn edges_out(&self) -> Rc<Vec<O::E>> {
        MixedNode::edges_out(self)
    }

    fn bundle_out(&self) -> Vec<BundleRef<O::B>> {
        MixedNode::bundle_out(self)
    }
}

/// Renders an acceptance range for diagnostics.
pub(crate) fn fmt_range(range: &RangeInclusive<usize>) -> String {
    match (*range.start(), *range.end()) {
        (lo, hi) if lo == hi => format!("exactly {lo}"),
        (lo, usize::MAX) => format!("{lo} or more"),
        (lo, hi) => format!("between {lo} and {hi}"),
    }
}
