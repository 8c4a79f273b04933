//! The node catalog: the stock shapes and their policies.
//!
//! Each constructor builds a [`MixedNode`] with a policy fixing the shape's
//! star-resolution rule, parameter mappings, acceptance ranges, flags and
//! bundle materialization:
//!
//! * [`adapter`] / [`identity`]: one-to-one parameter transforms.
//! * [`nexus`]: many-to-many collapse and replication.
//! * [`splitter`]: a single inward binding fanned out to a divisible
//!   multiplicity.
//! * [`source`] / [`sink`]: fixed parameter sequences at the graph edges.
//! * [`output`] / [`input`]: identity nodes with one hidden side whose
//!   bundles alias the visible side.
//! * [`blind_output`] / [`blind_input`]: graph edges whose bundle sequences
//!   flip to expose the opposite direction externally.
//! * [`internal_output`] / [`internal_input`]: graph edges materialized as
//!   free wires instead of module ports.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::error::{self, ErrorKind};
use crate::imp::{BundleRef, NodeImp};
use crate::node::{BaseNode, MixedNode, NodeFlags, NodePolicy, StarCx};
use crate::scope::Elaborator;

/// The unconstrained acceptance range.
const ANY: RangeInclusive<usize> = 0..=usize::MAX;

/// Which bundle side, if any, aliases the other.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Alias {
    None,
    InFromOut,
    OutFromIn,
}

fn fresh<P: NodeImp>(imp: &P, edges: &[P::E]) -> Vec<BundleRef<P::B>> {
    edges
        .iter()
        .map(|e| Rc::new(RefCell::new(imp.bundle(e))))
        .collect()
}

/// Materializes bundles for a homogeneous shape, honouring its alias.
fn alias_bundles<P: NodeImp>(
    alias: Alias,
    imp_i: &P,
    imp_o: &P,
    edges_in: &[P::E],
    edges_out: &[P::E],
) -> (Vec<BundleRef<P::B>>, Vec<BundleRef<P::B>>) {
    match alias {
        Alias::None => (fresh(imp_i, edges_in), fresh(imp_o, edges_out)),
        Alias::InFromOut => {
            let out = fresh(imp_o, edges_out);
            (out.clone(), out)
        }
        Alias::OutFromIn => {
            let inward = fresh(imp_i, edges_in);
            (inward.clone(), inward)
        }
    }
}

/// The adapter star rule, shared with the identity family.
///
/// At most one side may carry stars; the starred side passes through
/// whatever the other side has left over. With no stars at all the widths
/// are left for the arity and parameter checks to compare.
fn adapter_stars(cx: &StarCx<'_>, shape: &str) -> (usize, usize) {
    if cx.i_stars > 0 && cx.o_stars > 0 {
        cx.fail(
            ErrorKind::StarShape,
            format_args!("{shape} nodes cannot have star bindings on both sides"),
        );
    }
    if cx.o_stars > 0 {
        if cx.i_known < cx.o_known {
            cx.fail(
                ErrorKind::UnderAssigned,
                format_args!(
                    "{} inward ports cannot cover {} outward ports plus stars",
                    cx.i_known, cx.o_known
                ),
            );
        }
        (0, cx.i_known - cx.o_known)
    } else if cx.i_stars > 0 {
        if cx.o_known < cx.i_known {
            cx.fail(
                ErrorKind::UnderAssigned,
                format_args!(
                    "{} outward ports cannot cover {} inward ports plus stars",
                    cx.o_known, cx.i_known
                ),
            );
        }
        (cx.o_known - cx.i_known, 0)
    } else {
        (0, 0)
    }
}

struct AdapterPolicy<I: NodeImp, O: NodeImp> {
    dfn: Box<dyn Fn(&I::D) -> O::D>,
    ufn: Box<dyn Fn(&O::U) -> I::U>,
    num: RangeInclusive<usize>,
}

impl<I: NodeImp, O: NodeImp> NodePolicy<I, O> for AdapterPolicy<I, O> {
    fn shape(&self) -> &'static str {
        "adapter"
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        adapter_stars(cx, "adapter")
    }

    fn map_params_d(&self, node: &dyn BaseNode, n: usize, incoming: Vec<I::D>) -> Vec<O::D> {
        if incoming.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "adapters transform ports one-to-one, but {} inward parameters arrived for {} outward ports",
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        incoming.iter().map(&self.dfn).collect()
    }

    fn map_params_u(&self, node: &dyn BaseNode, n: usize, incoming: Vec<O::U>) -> Vec<I::U> {
        if incoming.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "adapters transform ports one-to-one, but {} upward parameters arrived for {} inward ports",
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        incoming.iter().map(&self.ufn).collect()
    }

    fn num_pi(&self) -> RangeInclusive<usize> {
        self.num.clone()
    }

    fn num_po(&self) -> RangeInclusive<usize> {
        self.num.clone()
    }
}

struct NexusPolicy<I: NodeImp, O: NodeImp> {
    dfn: Box<dyn Fn(&[I::D]) -> O::D>,
    ufn: Box<dyn Fn(&[O::U]) -> I::U>,
}

impl<I: NodeImp, O: NodeImp> NodePolicy<I, O> for NexusPolicy<I, O> {
    fn shape(&self) -> &'static str {
        "nexus"
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        if cx.i_stars > 0 || cx.o_stars > 0 {
            cx.fail(ErrorKind::StarShape, "nexus nodes accept no star bindings");
        }
        (0, 0)
    }

    fn map_params_d(&self, _node: &dyn BaseNode, n: usize, incoming: Vec<I::D>) -> Vec<O::D> {
        vec![(self.dfn)(&incoming); n]
    }

    fn map_params_u(&self, _node: &dyn BaseNode, n: usize, incoming: Vec<O::U>) -> Vec<I::U> {
        vec![(self.ufn)(&incoming); n]
    }
}

struct SplitterPolicy<I: NodeImp, O: NodeImp> {
    dfn: Box<dyn Fn(usize, &[I::D]) -> Vec<O::D>>,
    ufn: Box<dyn Fn(usize, &[O::U]) -> Vec<I::U>>,
}

impl<I: NodeImp, O: NodeImp> NodePolicy<I, O> for SplitterPolicy<I, O> {
    fn shape(&self) -> &'static str {
        "splitter"
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        if cx.i_stars > 0 {
            cx.fail(
                ErrorKind::StarShape,
                "splitters accept no inward star bindings",
            );
        }
        if cx.o_known != 0 {
            cx.fail(
                ErrorKind::StarShape,
                format_args!(
                    "splitters drive stars only, but {} outward ports were claimed directly",
                    cx.o_known
                ),
            );
        }
        (0, cx.i_known)
    }

    fn map_params_d(&self, node: &dyn BaseNode, n: usize, incoming: Vec<I::D>) -> Vec<O::D> {
        if !incoming.is_empty() && n % incoming.len() != 0 {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "cannot split {} inward parameters evenly across {} outward ports",
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        let produced = (self.dfn)(n, &incoming);
        if produced.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "splitter produced {} downward parameters for {} outward ports",
                    produced.len(),
                    n
                ),
                None,
            );
        }
        produced
    }

    fn map_params_u(&self, node: &dyn BaseNode, n: usize, incoming: Vec<O::U>) -> Vec<I::U> {
        let divisible = if n == 0 {
            incoming.is_empty()
        } else {
            incoming.len() % n == 0
        };
        if !divisible {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "cannot merge {} upward parameters evenly into {} inward ports",
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        let produced = (self.ufn)(n, &incoming);
        if produced.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "splitter produced {} upward parameters for {} inward ports",
                    produced.len(),
                    n
                ),
                None,
            );
        }
        produced
    }
}

struct IdentityPolicy<P: NodeImp> {
    shape: &'static str,
    flags: NodeFlags,
    alias: Alias,
    _imp: PhantomData<P>,
}

impl<P: NodeImp> NodePolicy<P, P> for IdentityPolicy<P> {
    fn shape(&self) -> &'static str {
        self.shape
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        adapter_stars(cx, self.shape)
    }

    fn map_params_d(&self, node: &dyn BaseNode, n: usize, incoming: Vec<P::D>) -> Vec<P::D> {
        if incoming.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "{} nodes pass ports through one-to-one, but {} inward parameters arrived for {} outward ports",
                    self.shape,
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        incoming
    }

    fn map_params_u(&self, node: &dyn BaseNode, n: usize, incoming: Vec<P::U>) -> Vec<P::U> {
        if incoming.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                node.path(),
                format_args!(
                    "{} nodes pass ports through one-to-one, but {} upward parameters arrived for {} inward ports",
                    self.shape,
                    incoming.len(),
                    n
                ),
                None,
            );
        }
        incoming
    }

    fn flags(&self) -> NodeFlags {
        self.flags
    }

    fn bundles(
        &self,
        imp_i: &P,
        imp_o: &P,
        edges_in: &[P::E],
        edges_out: &[P::E],
    ) -> (Vec<BundleRef<P::B>>, Vec<BundleRef<P::B>>) {
        alias_bundles(self.alias, imp_i, imp_o, edges_in, edges_out)
    }
}

struct SourcePolicy<P: NodeImp> {
    shape: &'static str,
    po: Vec<P::D>,
    flags: NodeFlags,
    alias: Alias,
}

impl<P: NodeImp> NodePolicy<P, P> for SourcePolicy<P> {
    fn shape(&self) -> &'static str {
        self.shape
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        if cx.i_stars > 0 || cx.i_known > 0 {
            cx.fail(
                ErrorKind::StarShape,
                format_args!("{} nodes accept no inward bindings", self.shape),
            );
        }
        if cx.o_stars > 1 {
            cx.fail(
                ErrorKind::StarShape,
                format_args!(
                    "at most one star binding may draw from a {}, found {}",
                    self.shape, cx.o_stars
                ),
            );
        }
        if cx.o_known > self.po.len() {
            cx.fail(
                ErrorKind::OverAssigned,
                format_args!(
                    "{} outward ports claimed from {} downward parameters",
                    cx.o_known,
                    self.po.len()
                ),
            );
        }
        (0, self.po.len() - cx.o_known)
    }

    fn map_params_d(&self, _node: &dyn BaseNode, _n: usize, _incoming: Vec<P::D>) -> Vec<P::D> {
        self.po.clone()
    }

    fn map_params_u(&self, _node: &dyn BaseNode, _n: usize, _incoming: Vec<P::U>) -> Vec<P::U> {
        Vec::new()
    }

    fn num_pi(&self) -> RangeInclusive<usize> {
        0..=0
    }

    fn num_po(&self) -> RangeInclusive<usize> {
        self.po.len()..=self.po.len()
    }

    fn flags(&self) -> NodeFlags {
        self.flags
    }

    fn bundle_in_allowed(&self) -> bool {
        self.alias == Alias::InFromOut
    }

    fn bundles(
        &self,
        imp_i: &P,
        imp_o: &P,
        edges_in: &[P::E],
        edges_out: &[P::E],
    ) -> (Vec<BundleRef<P::B>>, Vec<BundleRef<P::B>>) {
        alias_bundles(self.alias, imp_i, imp_o, edges_in, edges_out)
    }
}

struct SinkPolicy<P: NodeImp> {
    shape: &'static str,
    pi: Vec<P::U>,
    flags: NodeFlags,
    alias: Alias,
}

impl<P: NodeImp> NodePolicy<P, P> for SinkPolicy<P> {
    fn shape(&self) -> &'static str {
        self.shape
    }

    fn resolve_star(&self, cx: &StarCx<'_>) -> (usize, usize) {
        if cx.o_stars > 0 || cx.o_known > 0 {
            cx.fail(
                ErrorKind::StarShape,
                format_args!("{} nodes accept no outward bindings", self.shape),
            );
        }
        if cx.i_stars > 1 {
            cx.fail(
                ErrorKind::StarShape,
                format_args!(
                    "at most one star binding may feed a {}, found {}",
                    self.shape, cx.i_stars
                ),
            );
        }
        if cx.i_known > self.pi.len() {
            cx.fail(
                ErrorKind::OverAssigned,
                format_args!(
                    "{} inward ports claimed from {} upward parameters",
                    cx.i_known,
                    self.pi.len()
                ),
            );
        }
        (self.pi.len() - cx.i_known, 0)
    }

    fn map_params_d(&self, _node: &dyn BaseNode, _n: usize, _incoming: Vec<P::D>) -> Vec<P::D> {
        Vec::new()
    }

    fn map_params_u(&self, _node: &dyn BaseNode, _n: usize, _incoming: Vec<P::U>) -> Vec<P::U> {
        self.pi.clone()
    }

    fn num_pi(&self) -> RangeInclusive<usize> {
        self.pi.len()..=self.pi.len()
    }

    fn num_po(&self) -> RangeInclusive<usize> {
        0..=0
    }

    fn flags(&self) -> NodeFlags {
        self.flags
    }

    fn bundle_out_allowed(&self) -> bool {
        self.alias == Alias::OutFromIn
    }

    fn bundles(
        &self,
        imp_i: &P,
        imp_o: &P,
        edges_in: &[P::E],
        edges_out: &[P::E],
    ) -> (Vec<BundleRef<P::B>>, Vec<BundleRef<P::B>>) {
        alias_bundles(self.alias, imp_i, imp_o, edges_in, edges_out)
    }
}

/// An adapter: a one-to-one parameter transform between two protocols.
#[track_caller]
pub fn adapter<I, O, DF, UF>(
    elab: &Elaborator,
    name: &str,
    imp_i: I,
    imp_o: O,
    dfn: DF,
    ufn: UF,
) -> Rc<MixedNode<I, O>>
where
    I: NodeImp,
    O: NodeImp,
    DF: Fn(&I::D) -> O::D + 'static,
    UF: Fn(&O::U) -> I::U + 'static,
{
    adapter_with(elab, name, imp_i, imp_o, dfn, ufn, ANY)
}

/// An adapter accepting only port totals within `num`.
#[track_caller]
pub fn adapter_with<I, O, DF, UF>(
    elab: &Elaborator,
    name: &str,
    imp_i: I,
    imp_o: O,
    dfn: DF,
    ufn: UF,
    num: RangeInclusive<usize>,
) -> Rc<MixedNode<I, O>>
where
    I: NodeImp,
    O: NodeImp,
    DF: Fn(&I::D) -> O::D + 'static,
    UF: Fn(&O::U) -> I::U + 'static,
{
    MixedNode::new(
        elab,
        name,
        imp_i,
        imp_o,
        Box::new(AdapterPolicy {
            dfn: Box::new(dfn),
            ufn: Box::new(ufn),
            num,
        }),
    )
}

/// A nexus: collapses all inward parameters to one value and replicates it
/// to every port on the other side, in both directions.
#[track_caller]
pub fn nexus<I, O, DF, UF>(
    elab: &Elaborator,
    name: &str,
    imp_i: I,
    imp_o: O,
    dfn: DF,
    ufn: UF,
) -> Rc<MixedNode<I, O>>
where
    I: NodeImp,
    O: NodeImp,
    DF: Fn(&[I::D]) -> O::D + 'static,
    UF: Fn(&[O::U]) -> I::U + 'static,
{
    MixedNode::new(
        elab,
        name,
        imp_i,
        imp_o,
        Box::new(NexusPolicy {
            dfn: Box::new(dfn),
            ufn: Box::new(ufn),
        }),
    )
}

/// A splitter: fans its inward bindings out to a divisible multiplicity of
/// star-bound consumers.
///
/// The downward function receives the outward port count and the inward
/// parameters and must produce exactly one parameter per outward port; the
/// upward function is its mirror. The port counts are checked for
/// divisibility in both directions before the functions run.
#[track_caller]
pub fn splitter<I, O, DF, UF>(
    elab: &Elaborator,
    name: &str,
    imp_i: I,
    imp_o: O,
    dfn: DF,
    ufn: UF,
) -> Rc<MixedNode<I, O>>
where
    I: NodeImp,
    O: NodeImp,
    DF: Fn(usize, &[I::D]) -> Vec<O::D> + 'static,
    UF: Fn(usize, &[O::U]) -> Vec<I::U> + 'static,
{
    MixedNode::new(
        elab,
        name,
        imp_i,
        imp_o,
        Box::new(SplitterPolicy {
            dfn: Box::new(dfn),
            ufn: Box::new(ufn),
        }),
    )
}

/// An identity node: parameters pass through unchanged.
#[track_caller]
pub fn identity<P: NodeImp + Clone>(elab: &Elaborator, name: &str, imp: P) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(IdentityPolicy {
            shape: "identity",
            flags: NodeFlags::default(),
            alias: Alias::None,
            _imp: PhantomData::<P>,
        }),
    )
}

/// A source: offers the fixed downward parameter sequence `po`.
///
/// Accepts no inward bindings and has no inward bundle.
#[track_caller]
pub fn source<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    po: Vec<P::D>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SourcePolicy {
            shape: "source",
            po,
            flags: NodeFlags::default(),
            alias: Alias::None,
        }),
    )
}

/// A sink: demands the fixed upward parameter sequence `pi`.
///
/// Accepts no outward bindings and has no outward bundle.
#[track_caller]
pub fn sink<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    pi: Vec<P::U>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SinkPolicy {
            shape: "sink",
            pi,
            flags: NodeFlags::default(),
            alias: Alias::None,
        }),
    )
}

/// An identity node whose inward side is hidden; the hidden side's bundles
/// alias the visible outward side's.
#[track_caller]
pub fn output<P: NodeImp + Clone>(elab: &Elaborator, name: &str, imp: P) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(IdentityPolicy {
            shape: "output",
            flags: NodeFlags {
                external_in: false,
                ..NodeFlags::default()
            },
            alias: Alias::InFromOut,
            _imp: PhantomData::<P>,
        }),
    )
}

/// An identity node whose outward side is hidden; the hidden side's bundles
/// alias the visible inward side's.
#[track_caller]
pub fn input<P: NodeImp + Clone>(elab: &Elaborator, name: &str, imp: P) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(IdentityPolicy {
            shape: "input",
            flags: NodeFlags {
                external_out: false,
                ..NodeFlags::default()
            },
            alias: Alias::OutFromIn,
            _imp: PhantomData::<P>,
        }),
    )
}

/// A source whose bundle sequences flip, exposing the opposite direction
/// externally; the hidden inward side aliases the outward bundles.
#[track_caller]
pub fn blind_output<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    po: Vec<P::D>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SourcePolicy {
            shape: "blind-output",
            po,
            flags: NodeFlags {
                external_in: false,
                flip: true,
                ..NodeFlags::default()
            },
            alias: Alias::InFromOut,
        }),
    )
}

/// A sink whose bundle sequences flip, exposing the opposite direction
/// externally; the hidden outward side aliases the inward bundles.
#[track_caller]
pub fn blind_input<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    pi: Vec<P::U>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SinkPolicy {
            shape: "blind-input",
            pi,
            flags: NodeFlags {
                external_out: false,
                flip: true,
                ..NodeFlags::default()
            },
            alias: Alias::OutFromIn,
        }),
    )
}

/// A sink hidden on both sides whose bundles materialize as free wires; the
/// outward accessor aliases the inward bundles.
#[track_caller]
pub fn internal_output<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    pi: Vec<P::U>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SinkPolicy {
            shape: "internal-output",
            pi,
            flags: NodeFlags {
                external_in: false,
                external_out: false,
                flip: false,
                wire: true,
            },
            alias: Alias::OutFromIn,
        }),
    )
}

/// A source hidden on both sides whose bundles materialize as free wires;
/// the inward accessor aliases the outward bundles.
#[track_caller]
pub fn internal_input<P: NodeImp + Clone>(
    elab: &Elaborator,
    name: &str,
    imp: P,
    po: Vec<P::D>,
) -> Rc<MixedNode<P, P>> {
    MixedNode::new(
        elab,
        name,
        imp.clone(),
        imp,
        Box::new(SourcePolicy {
            shape: "internal-input",
            po,
            flags: NodeFlags {
                external_in: false,
                external_out: false,
                flip: false,
                wire: true,
            },
            alias: Alias::InFromOut,
        }),
    )
}
