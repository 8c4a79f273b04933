//! Failure semantics: every misuse dies synchronously with a named kind.

mod common;

use common::{down, up, Chan, Down, Up};
use parley::{shapes, Bind, Config, Elaborator};

fn plain_adapter(elab: &Elaborator, name: &str) -> std::rc::Rc<parley::MixedNode<Chan, Chan>> {
    shapes::adapter(
        elab,
        name,
        Chan,
        Chan,
        |d: &Down| d.clone(),
        |u: &Up| u.clone(),
    )
}

#[test]
#[should_panic(expected = "Arity")]
fn constrained_adapter_rejects_too_few_ports() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let adapt = shapes::adapter_with(
            &elab,
            "adapt",
            Chan,
            Chan,
            |d: &Down| d.clone(),
            |u: &Up| u.clone(),
            2..=2,
        );
        adapt.bind_once(&src);
        let _ = adapt.edges_in();
    });
}

#[test]
#[should_panic(expected = "StarShape")]
fn nexus_rejects_star_bindings() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let nexus = shapes::nexus(
            &elab,
            "hub",
            Chan,
            Chan,
            |ds: &[Down]| ds[0].clone(),
            |us: &[Up]| us[0].clone(),
        );
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        snk.bind_star_right(&nexus);
        let _ = nexus.o_star();
    });
}

#[test]
#[should_panic(expected = "StarShape")]
fn splitter_rejects_directly_claimed_outputs() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let split = shapes::splitter(
            &elab,
            "split",
            Chan,
            Chan,
            |n: usize, ds: &[Down]| vec![ds[0].clone(); n],
            |_n: usize, us: &[Up]| vec![us[0].clone()],
        );
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        split.bind_once(&src);
        snk.bind_once(&split);
        let _ = split.o_star();
    });
}

#[test]
#[should_panic(expected = "UnderAssigned")]
fn starred_adapter_rejects_missing_inputs() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let adapt = plain_adapter(&elab, "adapt");
        let direct = shapes::sink(&elab, "direct", Chan, vec![up(1)]);
        let starred = shapes::sink(&elab, "starred", Chan, vec![up(2)]);
        direct.bind_once(&adapt);
        starred.bind_star_right(&adapt);
        let _ = adapt.o_star();
    });
}

#[test]
#[should_panic(expected = "OverAssigned")]
fn source_rejects_more_claims_than_parameters() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let first = shapes::sink(&elab, "first", Chan, vec![up(1)]);
        let second = shapes::sink(&elab, "second", Chan, vec![up(1)]);
        first.bind_once(&src);
        second.bind_once(&src);
        let _ = src.o_star();
    });
}

#[test]
#[should_panic(expected = "ParamMismatch")]
fn adapter_rejects_unbalanced_sides() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let adapt = plain_adapter(&elab, "adapt");
        let first = shapes::sink(&elab, "first", Chan, vec![up(1)]);
        let second = shapes::sink(&elab, "second", Chan, vec![up(1)]);
        adapt.bind_once(&src);
        first.bind_once(&adapt);
        second.bind_once(&adapt);
        let _ = adapt.o_params();
    });
}

#[test]
#[should_panic(expected = "NotASink")]
fn sources_accept_no_inward_bindings() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let first = shapes::source(&elab, "first", Chan, vec![down(1)]);
        let second = shapes::source(&elab, "second", Chan, vec![down(1)]);
        first.bind_once(&second);
    });
}

#[test]
#[should_panic(expected = "NotASource")]
fn sinks_accept_no_outward_bindings() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let first = shapes::sink(&elab, "first", Chan, vec![up(1)]);
        let second = shapes::sink(&elab, "second", Chan, vec![up(1)]);
        first.bind_once(&second);
    });
}

#[test]
#[should_panic(expected = "BundleDisallowed")]
fn sources_have_no_inward_bundle() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
        let _ = src.bundle_in();
    });
}

#[test]
#[should_panic(expected = "BundleDisallowed")]
fn sinks_have_no_outward_bundle() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
        let _ = snk.bundle_out();
    });
}

#[test]
#[should_panic(expected = "InternalInvariant")]
fn parameter_cycles_are_detected() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let a = shapes::identity(&elab, "a", Chan);
        let b = shapes::identity(&elab, "b", Chan);
        a.bind_once(&b);
        b.bind_once(&a);
        let _ = a.o_params();
    });
}

#[test]
#[should_panic(expected = "InternalInvariant")]
fn star_cycles_are_detected() {
    let elab = Elaborator::new(Config::default());
    elab.scoped("top", |_| {
        let a = shapes::identity(&elab, "a", Chan);
        let b = shapes::identity(&elab, "b", Chan);
        a.bind_star_right(&b);
        b.bind_star_right(&a);
        let _ = a.i_star();
    });
}

#[test]
fn diagnostics_name_the_node_and_site() {
    let caught = std::panic::catch_unwind(|| {
        let elab = Elaborator::new(Config::default());
        elab.scoped("top", |_| {
            let src = shapes::source(&elab, "src", Chan, vec![down(1)]);
            let snk = shapes::sink(&elab, "snk", Chan, vec![up(1)]);
            snk.bind_once(&src);
            let _ = snk.i_params();
            let other = shapes::source(&elab, "other", Chan, vec![down(2)]);
            snk.bind_once(&other);
        });
    });
    let message = *caught
        .expect_err("binding after observation must fail")
        .downcast::<String>()
        .expect("panic payload is a formatted message");
    assert!(message.contains("Frozen"), "{message}");
    assert!(message.contains("top.snk"), "{message}");
    assert!(message.contains("errors.rs"), "{message}");
}
