//! The node catalog: star resolution, parameter mapping, and bundle aliasing.

mod common;

use std::rc::Rc;

use common::{down, up, Chan, Down, Up};
use parley::{shapes, BaseNode, Bind, Config, Elaborator};

fn doubling_adapter(elab: &Elaborator, name: &str) -> Rc<parley::MixedNode<Chan, Chan>> {
    shapes::adapter(
        elab,
        name,
        Chan,
        Chan,
        |d: &Down| Down {
            width: d.width * 2,
            via: d.via.clone(),
        },
        |u: &Up| Up {
            latency: u.latency + 1,
            via: u.via.clone(),
        },
    )
}

#[test]
fn star_right_fans_out_of_a_source() {
    let elab = Elaborator::new(Config::default());
    let (src, adapt, snk) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1), down(2), down(3)]);
        let adapt = doubling_adapter(&elab, "adapt");
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(4), up(5), up(6)]);
        adapt.bind_star_right(&src);
        snk.bind_star_left(&adapt);
        (src, adapt, snk)
    });

    assert_eq!(src.o_star(), 3);
    assert_eq!((adapt.i_star(), adapt.o_star()), (0, 0));
    assert_eq!(adapt.i_total(), 3);
    assert_eq!(adapt.o_total(), 3);

    let widths: Vec<u32> = adapt.o_params().iter().map(|d| d.width).collect();
    assert_eq!(widths, vec![2, 4, 6]);

    // Downward parameters pick up each node they flow out of.
    assert_eq!(
        adapt.o_params()[0].via,
        vec!["src".to_owned(), "adapt".to_owned()]
    );

    let latencies: Vec<u32> = snk.edges_in().iter().map(|e| e.latency).collect();
    assert_eq!(latencies, vec![4, 5, 6]);
}

#[test]
fn star_left_fans_into_a_sink() {
    let elab = Elaborator::new(Config::default());
    let (src, adapt, snk) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1), down(2)]);
        let adapt = doubling_adapter(&elab, "adapt");
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(7), up(9)]);
        adapt.bind_star_right(&src);
        snk.bind_star_left(&adapt);
        (src, adapt, snk)
    });

    assert_eq!(snk.i_star(), 2);
    assert_eq!(adapt.o_total(), 2);
    assert_eq!(adapt.i_total(), 2);
    assert_eq!(src.o_star(), 2);

    // Upward parameters transform on the way back toward the source.
    let latencies: Vec<u32> = adapt.i_params().iter().map(|u| u.latency).collect();
    assert_eq!(latencies, vec![8, 10]);
}

#[test]
fn nexus_collapses_and_replicates() {
    let elab = Elaborator::new(Config::default());
    let (nexus, snk) = elab.scoped("top", |_| {
        let first = shapes::source(&elab, "first", Chan, vec![down(1)]);
        let second = shapes::source(&elab, "second", Chan, vec![down(2)]);
        let nexus = shapes::nexus(
            &elab,
            "hub",
            Chan,
            Chan,
            |ds: &[Down]| Down {
                width: ds.iter().map(|d| d.width).sum(),
                via: Vec::new(),
            },
            |us: &[Up]| Up {
                latency: us.iter().map(|u| u.latency).max().unwrap_or(0),
                via: Vec::new(),
            },
        );
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(5)]);
        nexus.bind_once(&first);
        nexus.bind_once(&second);
        snk.bind_once(&nexus);
        (nexus, snk)
    });

    let outgoing = nexus.o_params();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].width, 3);

    let incoming = nexus.i_params();
    assert_eq!(incoming.len(), 2);
    assert_eq!(incoming[0], incoming[1]);
    assert_eq!(incoming[0].latency, 5);

    assert_eq!(snk.edges_in()[0].width, 3);
}

#[test]
fn splitter_divides_one_binding_across_consumers() {
    let elab = Elaborator::new(Config::default());
    let (split, left, right) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(4)]);
        let split = shapes::splitter(
            &elab,
            "split",
            Chan,
            Chan,
            |n: usize, ds: &[Down]| {
                let mut out = Vec::with_capacity(n);
                while out.len() < n {
                    out.extend(ds.iter().cloned());
                }
                out
            },
            |n: usize, us: &[Up]| {
                let chunk = us.len() / n.max(1);
                us.chunks(chunk.max(1))
                    .map(|c| Up {
                        latency: c.iter().map(|u| u.latency).max().unwrap_or(0),
                        via: Vec::new(),
                    })
                    .collect()
            },
        );
        let left = shapes::sink(&elab, "left", Chan, vec![up(2)]);
        let right = shapes::sink(&elab, "right", Chan, vec![up(7)]);
        split.bind_once(&src);
        left.bind_star_right(&split);
        right.bind_star_right(&split);
        (split, left, right)
    });

    assert_eq!(split.o_star(), 1);
    assert_eq!(split.o_total(), 2);
    let widths: Vec<u32> = split.o_params().iter().map(|d| d.width).collect();
    assert_eq!(widths, vec![4, 4]);

    // The merged upward demand is the worst of the consumers.
    assert_eq!(split.i_params()[0].latency, 7);
    assert_eq!(left.edges_in()[0].width, 4);
    assert_eq!(right.edges_in()[0].width, 4);
}

#[test]
fn identity_passes_parameters_through() {
    let elab = Elaborator::new(Config::default());
    let (src, ident, snk) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(3), down(5)]);
        let ident = shapes::identity(&elab, "ident", Chan);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1), up(2)]);
        ident.bind_star_right(&src);
        snk.bind_star_left(&ident);
        (src, ident, snk)
    });

    let widths: Vec<u32> = ident.o_params().iter().map(|d| d.width).collect();
    assert_eq!(widths, vec![3, 5]);
    let latencies: Vec<u32> = ident.i_params().iter().map(|u| u.latency).collect();
    assert_eq!(latencies, vec![1, 2]);

    // Identity changes nothing but the annotations.
    assert_eq!(src.o_params()[0].width, ident.o_params()[0].width);
    assert_eq!(snk.i_params()[1].latency, ident.i_params()[1].latency);
}

#[test]
fn sources_absorb_their_whole_parameter_sequence() {
    let elab = Elaborator::new(Config::default());

    // One star binding takes every port.
    let starred = elab.scoped("star", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1), down(2), down(3)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1), up(2), up(3)]);
        snk.bind_star_left(&src);
        src
    });
    assert_eq!(starred.o_star(), 3);
    assert_eq!(starred.o_total(), 3);
    assert_eq!(starred.o_ports_of(0), 0..3);

    // Three once bindings take one port each.
    let once = elab.scoped("once", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1), down(2), down(3)]);
        for name in ["a", "b", "c"] {
            let snk = shapes::sink(&elab, name, Chan, vec![up(1)]);
            snk.bind_once(&src);
        }
        src
    });
    assert_eq!(once.o_star(), 0);
    assert_eq!(once.o_total(), 3);
    for binding in 0..3 {
        assert_eq!(once.o_ports_of(binding).len(), 1);
    }
}

#[test]
fn output_nodes_alias_their_hidden_side() {
    let elab = Elaborator::new(Config::default());
    let (out, input) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let out = shapes::output(&elab, "out", Chan);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        let input = shapes::input(&elab, "in", Chan);
        out.bind_once(&src);
        input.bind_once(&out);
        snk.bind_once(&input);
        (out, input)
    });

    assert!(Rc::ptr_eq(&out.bundle_in()[0], &out.bundle_out()[0]));
    assert!(Rc::ptr_eq(&input.bundle_in()[0], &input.bundle_out()[0]));
    assert!(!out.flags().external_in);
    assert!(out.flags().external_out);
    assert!(input.flags().external_in);
    assert!(!input.flags().external_out);

    // The hidden sides contribute no external edges.
    assert!(out.external_edges_in().is_empty());
    assert_eq!(out.external_edges_out().len(), 1);
    assert!(input.external_edges_out().is_empty());
    assert_eq!(input.external_edges_in().len(), 1);
}

#[test]
fn blind_nodes_flip_and_alias() {
    let elab = Elaborator::new(Config::default());
    let (blind_out, blind_in) = elab.scoped("top", |_| {
        let blind_out = shapes::blind_output(&elab, "bo", Chan, vec![down(3)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        snk.bind_once(&blind_out);

        let blind_in = shapes::blind_input(&elab, "bi", Chan, vec![up(2)]);
        let src = shapes::source(&elab, "src", Chan, vec![down(4)]);
        blind_in.bind_once(&src);
        (blind_out, blind_in)
    });

    assert!(blind_out.flags().flip);
    assert!(Rc::ptr_eq(&blind_out.bundle_in()[0], &blind_out.bundle_out()[0]));
    assert!(blind_in.flags().flip);
    assert!(Rc::ptr_eq(&blind_in.bundle_in()[0], &blind_in.bundle_out()[0]));
}

#[test]
fn internal_nodes_are_free_wires() {
    let elab = Elaborator::new(Config::default());
    let (int_out, int_in) = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let int_out = shapes::internal_output(&elab, "io", Chan, vec![up(1)]);
        int_out.bind_once(&src);

        let int_in = shapes::internal_input(&elab, "ii", Chan, vec![down(2)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(2)]);
        snk.bind_once(&int_in);
        (int_out, int_in)
    });

    assert!(int_out.flags().wire);
    assert!(!int_out.flags().external_in);
    assert!(!int_out.flags().external_out);
    assert!(Rc::ptr_eq(&int_out.bundle_in()[0], &int_out.bundle_out()[0]));
    assert!(int_out.external_edges_in().is_empty());

    assert!(int_in.flags().wire);
    assert!(Rc::ptr_eq(&int_in.bundle_in()[0], &int_in.bundle_out()[0]));
}

#[test]
fn bundle_handles_are_stable_across_reads() {
    let elab = Elaborator::new(Config::default());
    let snk = elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        snk.bind_once(&src);
        snk
    });
    assert!(Rc::ptr_eq(&snk.bundle_in()[0], &snk.bundle_in()[0]));
}
