//! Emitting an elaborated node graph.
//!
//! Both emitters walk the elaboration's scope tree depth-first and render
//! every node that is connected to anything; nodes with neither inputs nor
//! outputs are omitted. Edges carry the protocol's label and colour, and
//! protocols that declare themselves reversed are drawn against the
//! direction of flow.

use std::rc::Rc;

use itertools::Itertools;

use crate::node::BaseNode;
use crate::scope::{Elaborator, Scope};

/// Renders the elaboration's node graph as a GraphML document.
pub fn graphml(elab: &Elaborator) -> String {
    let nodes = collect(elab);
    let shown = nodes
        .iter()
        .filter(|node| !node.omit_graphml())
        .collect::<Vec<_>>();

    let declarations = shown
        .iter()
        .map(|node| {
            format!(
                "    <node id=\"n{}\"><data key=\"name\">{}</data><data key=\"shape\">{}</data></node>",
                node.ident(),
                escape_xml(node.path()),
                node.shape()
            )
        })
        .join("\n");
    let edges = shown
        .iter()
        .flat_map(|node| {
            node.outputs()
                .into_iter()
                .enumerate()
                .map(|(port, (peer, edge))| {
                    format!(
                        "    <edge id=\"e{}.{}\" source=\"n{}\" target=\"n{}\"><data key=\"label\">{}</data></edge>",
                        node.ident(),
                        port,
                        node.ident(),
                        peer.ident(),
                        escape_xml(&edge.label)
                    )
                })
                .collect::<Vec<_>>()
        })
        .join("\n");

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n\
         \x20 <graph id=\"G\" edgedefault=\"directed\">\n\
         {declarations}\n{edges}\n\
         \x20 </graph>\n\
         </graphml>\n"
    )
}

/// Renders the elaboration's node graph in DOT format.
pub fn dot(elab: &Elaborator) -> String {
    let nodes = collect(elab);
    let shown = nodes
        .iter()
        .filter(|node| !node.omit_graphml())
        .collect::<Vec<_>>();

    let declarations = shown
        .iter()
        .map(|node| {
            format!(
                "  n{} [label=\"{}\\n{}\"];",
                node.ident(),
                escape_dot(node.path()),
                node.shape()
            )
        })
        .join("\n");
    let edges = shown
        .iter()
        .flat_map(|node| {
            node.outputs()
                .into_iter()
                .map(|(peer, edge)| {
                    // Reversed protocols draw the arrow against the flow.
                    let (tail, head) = if edge.flipped {
                        (peer.ident(), node.ident())
                    } else {
                        (node.ident(), peer.ident())
                    };
                    format!(
                        "  n{} -> n{} [label=\"{}\", color=\"{}\"];",
                        tail,
                        head,
                        escape_dot(&edge.label),
                        edge.colour
                    )
                })
                .collect::<Vec<_>>()
        })
        .join("\n");

    format!("digraph {{\n{declarations}\n{edges}\n}}\n")
}

/// All nodes in the elaboration, depth-first in registration order.
fn collect(elab: &Elaborator) -> Vec<Rc<dyn BaseNode>> {
    fn walk(scope: &Rc<Scope>, nodes: &mut Vec<Rc<dyn BaseNode>>) {
        nodes.extend(scope.nodes());
        for child in scope.children() {
            walk(&child, nodes);
        }
    }
    let mut nodes = Vec::new();
    for root in elab.roots() {
        walk(&root, &mut nodes);
    }
    nodes
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
