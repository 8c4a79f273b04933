//! The binding operators: recording the intent to connect two node handles.
//!
//! A binding is written sink-first: `sink.bind_once(&source)` records one
//! connection, `bind_star_left` lets the sink's star width choose the
//! multiplicity, and `bind_star_right` lets the source's. Each operator
//! pushes a mirrored record on both nodes and registers a deferred action in
//! the active scope; the action later pulls the resolved edge and bundle
//! slices for the binding and asks the shared protocol imp to connect them.

use std::rc::Rc;

use crate::error::{self, ErrorKind};
use crate::imp::{BundleRef, NodeImp, SourceInfo};
use crate::logging::{BindEvent, WireEvent};
use crate::node::{BaseNode, BindKind, InwardNode, MixedNode, OutwardNode};

/// The binding operators, available on a shared sink-side node handle.
///
/// `I` is the protocol the binding speaks: the sink's inward imp, which must
/// also be the source's outward imp.
pub trait Bind<I: NodeImp> {
    /// Binds exactly one connection from `source` into this node.
    #[track_caller]
    fn bind_once<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;

    /// Binds `source` into this node with the multiplicity chosen by this
    /// node's inward star width.
    #[track_caller]
    fn bind_star_left<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;

    /// Binds `source` into this node with the multiplicity chosen by the
    /// source's outward star width.
    #[track_caller]
    fn bind_star_right<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;

    /// Like [`bind_once`](Self::bind_once), without requesting a monitor.
    #[track_caller]
    fn bind_once_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;

    /// Like [`bind_star_left`](Self::bind_star_left), without requesting a
    /// monitor.
    #[track_caller]
    fn bind_star_left_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;

    /// Like [`bind_star_right`](Self::bind_star_right), without requesting a
    /// monitor.
    #[track_caller]
    fn bind_star_right_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static;
}

impl<I: NodeImp, O: NodeImp> Bind<I> for Rc<MixedNode<I, O>> {
    #[track_caller]
    fn bind_once<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Once, true, SourceInfo::caller());
    }

    #[track_caller]
    fn bind_star_left<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Star, true, SourceInfo::caller());
    }

    #[track_caller]
    fn bind_star_right<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Query, true, SourceInfo::caller());
    }

    #[track_caller]
    fn bind_once_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Once, false, SourceInfo::caller());
    }

    #[track_caller]
    fn bind_star_left_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Star, false, SourceInfo::caller());
    }

    #[track_caller]
    fn bind_star_right_unmonitored<S>(&self, source: &Rc<S>)
    where
        S: OutwardNode<I> + 'static,
    {
        bind(self, source, BindKind::Query, false, SourceInfo::caller());
    }
}

/// Records one binding: pushes the mirrored tags on both nodes and registers
/// the deferred connect action in the active scope.
fn bind<I, O, S>(
    sink: &Rc<MixedNode<I, O>>,
    source: &Rc<S>,
    kind: BindKind,
    monitor: bool,
    info: SourceInfo,
) where
    I: NodeImp,
    O: NodeImp,
    S: OutwardNode<I> + 'static,
{
    let elab = sink.scope_elab(info);
    let scope = elab.current().unwrap_or_else(|| {
        error::fail(
            ErrorKind::OutOfScope,
            sink.path(),
            "binding recorded outside any scope",
            Some(info),
        )
    });

    // Peer-local indices are read before either push so that both sides
    // record where the mirrored entry will land.
    let sink_binding = sink.i_recorded();
    let source_binding = source.o_recorded();
    source.o_push(
        sink_binding,
        Rc::clone(sink) as Rc<dyn InwardNode<I>>,
        kind.mirror(),
        info,
    );
    sink.i_push(
        source_binding,
        Rc::clone(source) as Rc<dyn OutwardNode<I>>,
        kind,
        info,
    );

    let ident = elab.next_identifier();
    let monitored = monitor && elab.config.monitors_enabled();
    if let Some(logger) = sink.logger() {
        logger.log(
            BindEvent {
                id: ident,
                sink: sink.ident(),
                source: source.ident(),
                kind,
                monitored,
            }
            .into(),
        );
    }

    let sink = Rc::clone(sink);
    let source = Rc::clone(source) as Rc<dyn OutwardNode<I>>;
    scope.defer(Box::new(move || {
        let edges = sink.edges_in();
        let ours = sink.i_ports_of(sink_binding);
        let theirs = source.o_ports_of(source_binding);
        if ours.len() != theirs.len() {
            error::fail(
                ErrorKind::InternalInvariant,
                sink.path(),
                format_args!(
                    "binding spans {} sink ports but {} source ports on {}",
                    ours.len(),
                    theirs.len(),
                    source.path()
                ),
                Some(info),
            );
        }
        let sink_bundles = sink.bundle_in();
        let source_bundles = source.bundle_out();
        let edges: Vec<I::E> = edges[ours.clone()].to_vec();
        let pairs: Vec<(BundleRef<I::B>, BundleRef<I::B>)> = ours
            .zip(theirs)
            .map(|(port, peer_port)| {
                (
                    Rc::clone(&sink_bundles[port]),
                    Rc::clone(&source_bundles[peer_port]),
                )
            })
            .collect();
        let (built, wire) = sink.inner().connect(&edges, &pairs, monitored);
        if let Some(logger) = sink.logger() {
            logger.log(
                WireEvent {
                    id: ident,
                    ports: pairs.len(),
                    monitored: built.is_some(),
                }
                .into(),
            );
        }
        wire();
        built
    }));
}
