//! A small channel-negotiation protocol shared by the integration tests.
//!
//! Producers offer a lane width downward, consumers demand a latency upward,
//! and the negotiated edge carries both. Bundles are observable wires so the
//! tests can see the deferred wiring actions run, and both parameter types
//! record the nodes they were annotated by, so the mix hooks are observable
//! too.

#![allow(dead_code)]

use std::any::Any;
use std::rc::Rc;

use parley::{BaseNode, BundleRef, NodeImp, WireFn};

/// Downward: what a producer offers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Down {
    pub width: u32,
    pub via: Vec<String>,
}

/// Upward: what a consumer demands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Up {
    pub latency: u32,
    pub via: Vec<String>,
}

/// The negotiated contract for one port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub width: u32,
    pub latency: u32,
}

/// A wire bundle, carrying one value once driven.
#[derive(Debug, Default)]
pub struct Wire {
    pub value: Option<u64>,
}

/// A monitor counting the ports of the binding it watches.
pub struct Monitor {
    pub ports: usize,
}

/// The channel protocol imp.
#[derive(Clone, Copy)]
pub struct Chan;

impl NodeImp for Chan {
    type D = Down;
    type U = Up;
    type E = Link;
    type B = Wire;

    fn edge(&self, d: Down, u: Up) -> Link {
        Link {
            width: d.width,
            latency: u.latency,
        }
    }

    fn bundle(&self, _e: &Link) -> Wire {
        Wire::default()
    }

    fn mix_o(&self, mut d: Down, node: &dyn BaseNode) -> Down {
        d.via.push(node.name().to_owned());
        d
    }

    fn mix_i(&self, mut u: Up, node: &dyn BaseNode) -> Up {
        u.via.push(node.name().to_owned());
        u
    }

    fn label(&self, e: &Link) -> String {
        format!("w{}l{}", e.width, e.latency)
    }

    fn colour(&self) -> String {
        "#4488cc".to_owned()
    }

    fn connect(
        &self,
        edges: &[Link],
        bundles: &[(BundleRef<Wire>, BundleRef<Wire>)],
        monitored: bool,
    ) -> (Option<Box<dyn Any>>, WireFn) {
        let monitor = monitored.then(|| Box::new(Monitor { ports: edges.len() }) as Box<dyn Any>);
        let pairs: Vec<_> = bundles
            .iter()
            .map(|(sink, source)| (Rc::clone(sink), Rc::clone(source)))
            .collect();
        let wire = Box::new(move || {
            for (port, (sink, source)) in pairs.iter().enumerate() {
                source.borrow_mut().value = Some(100 + port as u64);
                let driven = source.borrow().value;
                sink.borrow_mut().value = driven;
            }
        });
        (monitor, wire)
    }
}

/// A downward parameter with no annotations yet.
pub fn down(width: u32) -> Down {
    Down {
        width,
        via: Vec::new(),
    }
}

/// An upward parameter with no annotations yet.
pub fn up(latency: u32) -> Up {
    Up {
        latency,
        via: Vec::new(),
    }
}
