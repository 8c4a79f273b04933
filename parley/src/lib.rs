//! Parley is a parameter negotiation framework for wiring up statically
//! sized hardware modules during elaboration.
//!
//! Modules are represented as *nodes* in a typed graph. User code links node
//! handles with *binding* operators, each of which records an intent to
//! connect a sink-side node to a source-side node. Nothing is resolved at
//! bind time: once the graph is fully described, the first read of any
//! derived field determines how many parallel *ports* each binding carries
//! (star resolution), propagates downward and upward parameters until every
//! edge agrees on a negotiated contract, and materializes one bundle per
//! port, ready for connection.
//!
//! The code is organized so the pieces depend as little as possible on each
//! other:
//!
//! **Implementation contracts**: the [`imp`] module defines [`NodeImp`], the
//! per-protocol value that teaches the graph how to fuse parameters into
//! edges, build bundles, and physically connect a resolved binding.
//!
//! **Nodes and resolution**: the [`node`] module defines the node base, the
//! binding operators, the lazy resolution engine, and the catalog of node
//! shapes in [`node::shapes`].
//!
//! **Scopes**: the [`scope`] module defines the explicit elaboration context:
//! a stack of scopes owning nodes, deferred wiring actions, and monitors.
//!
//! # Examples
//!
//! The following negotiates one connection between a source offering four
//! lanes and a sink that can accept two.
//!
//! ```
//! use parley::{shapes, Bind, Config, Elaborator, NodeImp};
//!
//! #[derive(Clone)]
//! struct Lanes;
//!
//! impl NodeImp for Lanes {
//!     type D = u32; // lanes offered
//!     type U = u32; // lanes accepted
//!     type E = u32; // lanes carried
//!     type B = Vec<u8>; // one byte per carried lane
//!
//!     fn edge(&self, d: u32, u: u32) -> u32 { d.min(u) }
//!     fn bundle(&self, e: &u32) -> Vec<u8> { vec![0; *e as usize] }
//! }
//!
//! let elab = Elaborator::new(Config::default());
//! elab.scoped("top", |_scope| {
//!     let src = shapes::source(&elab, "src", Lanes, vec![4]);
//!     let snk = shapes::sink(&elab, "snk", Lanes, vec![2]);
//!     snk.bind_once(&src);
//!     assert_eq!(*snk.edges_in(), vec![2]);
//! });
//! elab.apply_wiring();
//! ```

#![forbid(missing_docs)]

pub mod error;
pub mod graph;
pub mod imp;
pub mod logging;
pub mod node;
pub mod scope;

pub use error::ErrorKind;
pub use imp::{BundleRef, NodeImp, SourceInfo, WireFn};
pub use node::shapes;
pub use node::{
    BaseNode, Bind, BindKind, InwardNode, MixedNode, NodeFlags, NodePolicy, OutwardNode,
    RenderedEdge, StarCx,
};
pub use scope::{Config, Elaborator, Scope};

/// Re-export of the `parley_logging` crate.
pub mod logging_core {
    pub use parley_logging::*;
}
