//! First-touch lazy resolution of a node's derived state.
//!
//! Reading any derived field freezes both push lists and resolves, in order:
//! star widths (which recurse into neighbours), port mappings, propagated
//! parameters, edges, and bundles. Each quantity is computed once and cached;
//! per-quantity guards turn genuine recurrences in the binding graph into
//! diagnostics rather than unbounded recursion.

use std::ops::Range;
use std::rc::Rc;

use crate::error::{self, ErrorKind};
use crate::imp::{BundleRef, NodeImp};
use crate::logging::ResolveEvent;
use crate::node::{fmt_range, BaseNode, BindKind, InwardNode, MixedNode, OutwardNode, StarCx};

impl<I: NodeImp, O: NodeImp> MixedNode<I, O> {
    /// Freezes both push lists; later pushes fail with `Frozen`.
    fn freeze(&self) {
        self.i_frozen.set(true);
        self.o_frozen.set(true);
    }

    /// Resolves and caches `(i_star, o_star)` for this node.
    ///
    /// Star resolution pulls the star width of the *opposite* side of every
    /// query-tagged peer, so the recursion never returns to the side it left
    /// through; a genuine cycle trips the guard instead.
    fn resolved_stars(&self) -> (usize, usize) {
        if let Some(stars) = self.stars.get() {
            return stars;
        }
        if self.resolving_stars.replace(true) {
            error::fail(
                ErrorKind::InternalInvariant,
                &self.qualified,
                "star resolution re-entered; the binding graph contains a cycle",
                None,
            );
        }
        self.freeze();

        let mut i_known = 0;
        let mut i_stars = 0;
        let mut i_star_site = None;
        for binding in self.i_bindings.borrow().iter() {
            match binding.kind {
                BindKind::Once => i_known += 1,
                BindKind::Query => i_known += binding.peer.o_star(),
                BindKind::Star => {
                    i_stars += 1;
                    i_star_site = i_star_site.or(Some(binding.info));
                }
            }
        }
        let mut o_known = 0;
        let mut o_stars = 0;
        let mut o_star_site = None;
        for binding in self.o_bindings.borrow().iter() {
            match binding.kind {
                BindKind::Once => o_known += 1,
                BindKind::Query => o_known += binding.peer.i_star(),
                BindKind::Star => {
                    o_stars += 1;
                    o_star_site = o_star_site.or(Some(binding.info));
                }
            }
        }

        let cx = StarCx {
            node: self,
            i_known,
            o_known,
            i_stars,
            o_stars,
            i_star_site,
            o_star_site,
        };
        let (i_star, o_star) = self.policy.resolve_star(&cx);
        self.stars.set(Some((i_star, o_star)));
        self.resolving_stars.set(false);

        if let Some(logger) = &self.logging {
            logger.log(
                ResolveEvent {
                    id: self.ident,
                    i_star,
                    o_star,
                    inward: i_known + i_stars * i_star,
                    outward: o_known + o_stars * o_star,
                }
                .into(),
            );
        }
        (i_star, o_star)
    }

    /// The resolved inward star width.
    pub fn i_star(&self) -> usize {
        self.resolved_stars().0
    }

    /// The resolved outward star width.
    pub fn o_star(&self) -> usize {
        self.resolved_stars().1
    }

    /// The inward port mapping: one half-open range per binding, push order.
    pub fn i_port_mapping(&self) -> Rc<Vec<Range<usize>>> {
        if let Some(mapping) = self.i_mapping.borrow().as_ref() {
            return Rc::clone(mapping);
        }
        let (i_star, _) = self.resolved_stars();
        let mut ranges = Vec::with_capacity(self.i_bindings.borrow().len());
        let mut cursor = 0;
        for binding in self.i_bindings.borrow().iter() {
            let width = match binding.kind {
                BindKind::Once => 1,
                BindKind::Query => binding.peer.o_star(),
                BindKind::Star => i_star,
            };
            ranges.push(cursor..cursor + width);
            cursor += width;
        }
        if !self.num_pi.contains(&cursor) {
            error::fail(
                ErrorKind::Arity,
                &self.qualified,
                format_args!(
                    "{} inward ports resolved, but the node accepts {}",
                    cursor,
                    fmt_range(&self.num_pi)
                ),
                None,
            );
        }
        let ranges = Rc::new(ranges);
        *self.i_mapping.borrow_mut() = Some(Rc::clone(&ranges));
        ranges
    }

    /// The outward port mapping: one half-open range per binding, push order.
    pub fn o_port_mapping(&self) -> Rc<Vec<Range<usize>>> {
        if let Some(mapping) = self.o_mapping.borrow().as_ref() {
            return Rc::clone(mapping);
        }
        let (_, o_star) = self.resolved_stars();
        let mut ranges = Vec::with_capacity(self.o_bindings.borrow().len());
        let mut cursor = 0;
        for binding in self.o_bindings.borrow().iter() {
            let width = match binding.kind {
                BindKind::Once => 1,
                BindKind::Query => binding.peer.i_star(),
                BindKind::Star => o_star,
            };
            ranges.push(cursor..cursor + width);
            cursor += width;
        }
        if !self.num_po.contains(&cursor) {
            error::fail(
                ErrorKind::Arity,
                &self.qualified,
                format_args!(
                    "{} outward ports resolved, but the node accepts {}",
                    cursor,
                    fmt_range(&self.num_po)
                ),
                None,
            );
        }
        let ranges = Rc::new(ranges);
        *self.o_mapping.borrow_mut() = Some(Rc::clone(&ranges));
        ranges
    }

    /// The inward port range of one binding.
    pub fn i_ports_of(&self, binding: usize) -> Range<usize> {
        self.i_port_mapping()[binding].clone()
    }

    /// The outward port range of one binding.
    pub fn o_ports_of(&self, binding: usize) -> Range<usize> {
        self.o_port_mapping()[binding].clone()
    }

    /// The resolved inward port total.
    pub fn i_total(&self) -> usize {
        self.i_port_mapping().last().map_or(0, |range| range.end)
    }

    /// The resolved outward port total.
    pub fn o_total(&self) -> usize {
        self.o_port_mapping().last().map_or(0, |range| range.end)
    }

    /// One downward parameter per resolved outward port.
    ///
    /// Collects the downward parameters flowing in through the inward
    /// bindings, maps them through the policy, and annotates each result
    /// with this node via the outward imp.
    pub fn o_params(&self) -> Rc<Vec<O::D>> {
        if let Some(params) = self.o_params.borrow().as_ref() {
            return Rc::clone(params);
        }
        if self.resolving_o.replace(true) {
            error::fail(
                ErrorKind::InternalInvariant,
                &self.qualified,
                "downward parameter propagation re-entered; the binding graph contains a cycle",
                None,
            );
        }
        let n = self.o_total();
        let mapping = self.i_port_mapping();
        let mut incoming: Vec<I::D> = Vec::with_capacity(self.i_total());
        for (binding, record) in self.i_bindings.borrow().iter().enumerate() {
            let ours = mapping[binding].clone();
            let theirs = record.peer.o_ports_of(record.peer_binding);
            if ours.len() != theirs.len() {
                error::fail(
                    ErrorKind::InternalInvariant,
                    &self.qualified,
                    format_args!(
                        "inward binding {} spans {} ports here but {} on {}",
                        binding,
                        ours.len(),
                        theirs.len(),
                        record.peer.path()
                    ),
                    Some(record.info),
                );
            }
            let params = record.peer.o_params();
            incoming.extend(params[theirs].iter().cloned());
        }
        let mapped = self.policy.map_params_d(self, n, incoming);
        if mapped.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                &self.qualified,
                format_args!(
                    "downward mapping produced {} parameters for {} outward ports",
                    mapped.len(),
                    n
                ),
                None,
            );
        }
        let params = Rc::new(
            mapped
                .into_iter()
                .map(|d| self.imp_o.mix_o(d, self))
                .collect::<Vec<_>>(),
        );
        *self.o_params.borrow_mut() = Some(Rc::clone(&params));
        self.resolving_o.set(false);
        params
    }

    /// One upward parameter per resolved inward port.
    ///
    /// Collects the upward parameters flowing back through the outward
    /// bindings, maps them through the policy, and annotates each result
    /// with this node via the inward imp.
    pub fn i_params(&self) -> Rc<Vec<I::U>> {
        if let Some(params) = self.i_params.borrow().as_ref() {
            return Rc::clone(params);
        }
        if self.resolving_i.replace(true) {
            error::fail(
                ErrorKind::InternalInvariant,
                &self.qualified,
                "upward parameter propagation re-entered; the binding graph contains a cycle",
                None,
            );
        }
        let n = self.i_total();
        let mapping = self.o_port_mapping();
        let mut incoming: Vec<O::U> = Vec::with_capacity(self.o_total());
        for (binding, record) in self.o_bindings.borrow().iter().enumerate() {
            let ours = mapping[binding].clone();
            let theirs = record.peer.i_ports_of(record.peer_binding);
            if ours.len() != theirs.len() {
                error::fail(
                    ErrorKind::InternalInvariant,
                    &self.qualified,
                    format_args!(
                        "outward binding {} spans {} ports here but {} on {}",
                        binding,
                        ours.len(),
                        theirs.len(),
                        record.peer.path()
                    ),
                    Some(record.info),
                );
            }
            let params = record.peer.i_params();
            incoming.extend(params[theirs].iter().cloned());
        }
        let mapped = self.policy.map_params_u(self, n, incoming);
        if mapped.len() != n {
            error::fail(
                ErrorKind::ParamMismatch,
                &self.qualified,
                format_args!(
                    "upward mapping produced {} parameters for {} inward ports",
                    mapped.len(),
                    n
                ),
                None,
            );
        }
        let params = Rc::new(
            mapped
                .into_iter()
                .map(|u| self.imp_i.mix_i(u, self))
                .collect::<Vec<_>>(),
        );
        *self.i_params.borrow_mut() = Some(Rc::clone(&params));
        self.resolving_i.set(false);
        params
    }

    /// One negotiated edge per resolved inward port: the peer's downward
    /// parameter fused with this node's upward parameter.
    pub fn edges_in(&self) -> Rc<Vec<I::E>> {
        if let Some(edges) = self.edges_in.borrow().as_ref() {
            return Rc::clone(edges);
        }
        let ours_params = self.i_params();
        let mapping = self.i_port_mapping();
        let mut edges = Vec::with_capacity(self.i_total());
        for (binding, record) in self.i_bindings.borrow().iter().enumerate() {
            let ours = mapping[binding].clone();
            let theirs = record.peer.o_ports_of(record.peer_binding);
            if ours.len() != theirs.len() {
                error::fail(
                    ErrorKind::InternalInvariant,
                    &self.qualified,
                    format_args!(
                        "inward binding {} spans {} ports here but {} on {}",
                        binding,
                        ours.len(),
                        theirs.len(),
                        record.peer.path()
                    ),
                    Some(record.info),
                );
            }
            let params = record.peer.o_params();
            for (port, peer_port) in ours.zip(theirs) {
                edges.push(
                    self.imp_i
                        .edge(params[peer_port].clone(), ours_params[port].clone()),
                );
            }
        }
        let edges = Rc::new(edges);
        *self.edges_in.borrow_mut() = Some(Rc::clone(&edges));
        edges
    }

    /// One negotiated edge per resolved outward port: this node's downward
    /// parameter fused with the peer's upward parameter.
    pub fn edges_out(&self) -> Rc<Vec<O::E>> {
        if let Some(edges) = self.edges_out.borrow().as_ref() {
            return Rc::clone(edges);
        }
        let ours_params = self.o_params();
        let mapping = self.o_port_mapping();
        let mut edges = Vec::with_capacity(self.o_total());
        for (binding, record) in self.o_bindings.borrow().iter().enumerate() {
            let ours = mapping[binding].clone();
            let theirs = record.peer.i_ports_of(record.peer_binding);
            if ours.len() != theirs.len() {
                error::fail(
                    ErrorKind::InternalInvariant,
                    &self.qualified,
                    format_args!(
                        "outward binding {} spans {} ports here but {} on {}",
                        binding,
                        ours.len(),
                        theirs.len(),
                        record.peer.path()
                    ),
                    Some(record.info),
                );
            }
            let params = record.peer.i_params();
            for (port, peer_port) in ours.zip(theirs) {
                edges.push(
                    self.imp_o
                        .edge(ours_params[port].clone(), params[peer_port].clone()),
                );
            }
        }
        let edges = Rc::new(edges);
        *self.edges_out.borrow_mut() = Some(Rc::clone(&edges));
        edges
    }

    /// The inward edges when the inward side is external, otherwise empty.
    pub fn external_edges_in(&self) -> Rc<Vec<I::E>> {
        if self.flags.external_in {
            self.edges_in()
        } else {
            Rc::new(Vec::new())
        }
    }

    /// The outward edges when the outward side is external, otherwise empty.
    pub fn external_edges_out(&self) -> Rc<Vec<O::E>> {
        if self.flags.external_out {
            self.edges_out()
        } else {
            Rc::new(Vec::new())
        }
    }

    /// Materializes both bundle sequences through the policy.
    fn materialize_bundles(&self) {
        if self.bundles_in.borrow().is_some() {
            return;
        }
        let edges_in = self.edges_in();
        let edges_out = self.edges_out();
        let (bundles_in, bundles_out) =
            self.policy
                .bundles(&self.imp_i, &self.imp_o, &edges_in, &edges_out);
        *self.bundles_in.borrow_mut() = Some(bundles_in);
        *self.bundles_out.borrow_mut() = Some(bundles_out);
    }

    /// One bundle handle per resolved inward port.
    ///
    /// Shapes that alias their bundle sides return the same handles from
    /// both accessors; repeated calls always return the same handles.
    pub fn bundle_in(&self) -> Vec<BundleRef<I::B>> {
        if !self.policy.bundle_in_allowed() {
            error::fail(
                ErrorKind::BundleDisallowed,
                &self.qualified,
                format_args!("{} nodes have no inward bundle", self.policy.shape()),
                None,
            );
        }
        self.materialize_bundles();
        self.bundles_in.borrow().clone().unwrap_or_default()
    }

    /// One bundle handle per resolved outward port.
    ///
    /// Shapes that alias their bundle sides return the same handles from
    /// both accessors; repeated calls always return the same handles.
    pub fn bundle_out(&self) -> Vec<BundleRef<O::B>> {
        if !self.policy.bundle_out_allowed() {
            error::fail(
                ErrorKind::BundleDisallowed,
                &self.qualified,
                format_args!("{} nodes have no outward bundle", self.policy.shape()),
                None,
            );
        }
        self.materialize_bundles();
        self.bundles_out.borrow().clone().unwrap_or_default()
    }
}
