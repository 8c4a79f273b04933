//! Diagnostics for elaboration failures.
//!
//! Every failure in the node graph is synchronous and fatal: elaboration
//! cannot proceed past a node whose bindings are inconsistent, so failures
//! panic with a formatted diagnostic and are never caught or retried. A
//! diagnostic leads with the stable [`ErrorKind`] name, then the offending
//! node's qualified name, free-form detail, and, when one was recorded, the
//! source location of the offending push or declaration.

use std::fmt;

use crate::imp::SourceInfo;

/// The kind of an elaboration failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A node was constructed or bound with no scope active.
    OutOfScope,
    /// A push arrived after the corresponding side had been observed.
    Frozen,
    /// An inward binding was pushed onto a node that accepts no inputs.
    NotASink,
    /// An outward binding was pushed onto a node that produces no outputs.
    NotASource,
    /// The node's shape forbids the observed star binding pattern.
    StarShape,
    /// Known widths leave a star width unsatisfiable from below.
    UnderAssigned,
    /// Known widths exceed what the shape can absorb.
    OverAssigned,
    /// A resolved port total fell outside the acceptance range.
    Arity,
    /// A parameter mapping produced the wrong number of parameters.
    ParamMismatch,
    /// The requested bundle side is not defined for this shape.
    BundleDisallowed,
    /// Mirrored bindings disagree, or resolution re-entered itself.
    InternalInvariant,
}

impl ErrorKind {
    /// The stable name of this kind, as it appears in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::OutOfScope => "OutOfScope",
            ErrorKind::Frozen => "Frozen",
            ErrorKind::NotASink => "NotASink",
            ErrorKind::NotASource => "NotASource",
            ErrorKind::StarShape => "StarShape",
            ErrorKind::UnderAssigned => "UnderAssigned",
            ErrorKind::OverAssigned => "OverAssigned",
            ErrorKind::Arity => "Arity",
            ErrorKind::ParamMismatch => "ParamMismatch",
            ErrorKind::BundleDisallowed => "BundleDisallowed",
            ErrorKind::InternalInvariant => "InternalInvariant",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reports a fatal elaboration failure at `node`.
pub(crate) fn fail(
    kind: ErrorKind,
    node: &str,
    detail: impl fmt::Display,
    site: Option<SourceInfo>,
) -> ! {
    match site {
        Some(site) => panic!("{} at {}: {} (from {})", kind, node, detail, site),
        None => panic!("{} at {}: {}", kind, node, detail),
    }
}
