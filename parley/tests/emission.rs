//! Graph emission and the elaboration log stream.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{down, up, Chan};
use parley::logging::GraphEvent;
use parley::{graph, shapes, Bind, Config, Elaborator};

#[test]
fn graphml_includes_bound_nodes_and_omits_loners() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(8)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(3)]);
        let _loner = shapes::identity(&elab, "loner", Chan);
        snk.bind_once(&src);
    });

    let doc = graph::graphml(&elab);
    assert!(doc.contains("top.src"), "{doc}");
    assert!(doc.contains("top.snk"), "{doc}");
    assert!(!doc.contains("loner"), "{doc}");
    assert!(doc.contains("<edge"), "{doc}");
    // The protocol labels its edges with the negotiated contract.
    assert!(doc.contains("w8l3"), "{doc}");
}

#[test]
fn dot_uses_the_protocol_colour() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        snk.bind_once(&src);
    });

    let doc = graph::dot(&elab);
    assert!(doc.starts_with("digraph {"), "{doc}");
    assert!(doc.contains("->"), "{doc}");
    assert!(doc.contains("#4488cc"), "{doc}");
}

#[test]
fn nested_scopes_contribute_their_nodes() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        elab.scoped("inner", |_| {
            let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
            snk.bind_once(&src);
        });
    });

    let doc = graph::graphml(&elab);
    assert!(doc.contains("top.src"), "{doc}");
    assert!(doc.contains("top.inner.snk"), "{doc}");
}

#[test]
fn the_log_stream_sees_the_whole_lifecycle() {
    let elab = Elaborator::new(Config::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let drain = Rc::clone(&seen);
    elab.log_register()
        .insert::<GraphEvent, _>("parley", move |_time, batch| {
            drain
                .borrow_mut()
                .extend(batch.iter().map(|(_, event)| event.clone()));
        });

    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        snk.bind_once(&src);
    });
    elab.apply_wiring();

    let events = seen.borrow();
    let nodes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GraphEvent::Node(node) => Some(node.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].name, "src");
    assert_eq!(nodes[0].shape, "source");
    assert_eq!(nodes[0].scope, "top");
    assert_eq!(nodes[1].name, "snk");

    let binds: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GraphEvent::Bind(bind) => Some(bind.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(binds.len(), 1);
    assert_eq!(binds[0].sink, nodes[1].id);
    assert_eq!(binds[0].source, nodes[0].id);
    assert!(binds[0].monitored);

    let resolves = events
        .iter()
        .filter(|e| matches!(e, GraphEvent::Resolve(_)))
        .count();
    assert_eq!(resolves, 2);

    let wires: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GraphEvent::Wire(wire) => Some(wire.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(wires.len(), 1);
    assert_eq!(wires[0].ports, 1);
    assert!(wires[0].monitored);
    assert_eq!(wires[0].id, binds[0].id);

    // Lifecycle order: both nodes, then the binding, then resolution, then
    // the wiring action.
    let positions: Vec<usize> = [
        events
            .iter()
            .position(|e| matches!(e, GraphEvent::Bind(_)))
            .expect("bind logged"),
        events
            .iter()
            .position(|e| matches!(e, GraphEvent::Resolve(_)))
            .expect("resolve logged"),
        events
            .iter()
            .position(|e| matches!(e, GraphEvent::Wire(_)))
            .expect("wire logged"),
    ]
    .to_vec();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}
