//! Elaboration scopes and the deferred wiring they accumulate.
//!
//! An [`Elaborator`] is the explicit context for one elaboration: it carries a
//! stack of open scopes, hands out elaboration-unique identifiers, and owns
//! the logging registry. Nodes register themselves in the scope active at
//! their construction; binding operators register a deferred wiring action in
//! the scope active at the bind. Once the graph is fully described,
//! [`Elaborator::apply_wiring`] resolves every binding and runs the actions
//! in registration order.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::time::Instant;

use crate::logging::{GraphEvent, GraphLogger, GRAPH_LOG};
use crate::node::BaseNode;

/// Per-elaboration configuration.
#[derive(Clone, Debug)]
pub struct Config {
    monitoring: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config { monitoring: true }
    }
}

impl Config {
    /// Sets whether bindings may construct monitors.
    ///
    /// When disabled, monitors are suppressed for every binding, including
    /// those recorded with the monitor-requesting operators.
    pub fn monitoring(mut self, enable: bool) -> Self {
        self.monitoring = enable;
        self
    }

    pub(crate) fn monitors_enabled(&self) -> bool {
        self.monitoring
    }
}

/// The root context for one elaboration.
///
/// # Examples
///
/// ```
/// use parley::{Config, Elaborator};
///
/// let elab = Elaborator::new(Config::default());
/// elab.scoped("top", |scope| {
///     assert_eq!(scope.path(), "top");
///     elab.scoped("leaf", |inner| {
///         assert_eq!(inner.path(), "top.leaf");
///     });
/// });
/// assert!(elab.current().is_none());
/// ```
pub struct Elaborator {
    pub(crate) inner: Rc<ElabInner>,
}

pub(crate) struct ElabInner {
    pub(crate) config: Config,
    stack: RefCell<Vec<Rc<Scope>>>,
    roots: RefCell<Vec<Rc<Scope>>>,
    identifiers: Cell<usize>,
    logging: RefCell<parley_logging::Registry>,
}

impl Elaborator {
    /// Creates a new elaboration context.
    pub fn new(config: Config) -> Self {
        Elaborator {
            inner: Rc::new(ElabInner {
                config,
                stack: RefCell::new(Vec::new()),
                roots: RefCell::new(Vec::new()),
                identifiers: Cell::new(0),
                logging: RefCell::new(parley_logging::Registry::new(Instant::now())),
            }),
        }
    }

    /// Opens a scope named `name`, runs `func` inside it, and closes it.
    ///
    /// Scopes nest: a scope opened while another is active becomes its child,
    /// and its path is the dot-joined ancestry.
    pub fn scoped<R>(&self, name: &str, func: impl FnOnce(&Rc<Scope>) -> R) -> R {
        let scope = self.push_scope(name);
        let result = func(&scope);
        self.inner.stack.borrow_mut().pop();
        result
    }

    fn push_scope(&self, name: &str) -> Rc<Scope> {
        let parent = self.inner.current();
        let path = match &parent {
            Some(parent) => format!("{}.{}", parent.path(), name),
            None => name.to_owned(),
        };
        let scope = Rc::new(Scope {
            elab: Rc::downgrade(&self.inner),
            name: name.to_owned(),
            path,
            counter: Cell::new(0),
            nodes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            wiring: RefCell::new(Vec::new()),
            monitors: RefCell::new(Vec::new()),
        });
        match parent {
            Some(parent) => parent.children.borrow_mut().push(Rc::clone(&scope)),
            None => self.inner.roots.borrow_mut().push(Rc::clone(&scope)),
        }
        self.inner.stack.borrow_mut().push(Rc::clone(&scope));
        scope
    }

    /// The currently active scope, if any.
    pub fn current(&self) -> Option<Rc<Scope>> {
        self.inner.current()
    }

    /// The root scopes registered so far, in registration order.
    pub fn roots(&self) -> Vec<Rc<Scope>> {
        self.inner.roots.borrow().clone()
    }

    /// Access to named loggers.
    ///
    /// Log streams must be registered before the events of interest are
    /// produced; nodes capture their logger at construction.
    pub fn log_register(&self) -> RefMut<'_, parley_logging::Registry> {
        self.inner.logging.borrow_mut()
    }

    /// The graph event logger, if one has been registered.
    pub fn logging(&self) -> Option<GraphLogger> {
        self.inner.logging()
    }

    /// Resolves every binding and applies all deferred wiring actions.
    ///
    /// Scopes are visited depth-first in registration order; within a scope,
    /// actions run in binding registration order. Monitors constructed along
    /// the way are retained by the scope that owned the binding. Buffered log
    /// events are flushed afterwards.
    pub fn apply_wiring(&self) {
        for scope in self.roots() {
            scope.apply_wiring();
        }
        self.inner.logging.borrow_mut().flush();
    }
}

impl ElabInner {
    pub(crate) fn current(&self) -> Option<Rc<Scope>> {
        self.stack.borrow().last().cloned()
    }

    pub(crate) fn next_identifier(&self) -> usize {
        let id = self.identifiers.get();
        self.identifiers.set(id + 1);
        id
    }

    pub(crate) fn logging(&self) -> Option<GraphLogger> {
        self.logging.borrow().get::<GraphEvent>(GRAPH_LOG)
    }
}

/// One level of the elaboration scope stack.
///
/// A scope owns the nodes constructed inside it, the child scopes opened
/// inside it, the deferred wiring actions registered by its bindings, and the
/// monitors those actions construct when they run.
pub struct Scope {
    elab: Weak<ElabInner>,
    name: String,
    path: String,
    counter: Cell<usize>,
    nodes: RefCell<Vec<Rc<dyn BaseNode>>>,
    children: RefCell<Vec<Rc<Scope>>>,
    wiring: RefCell<Vec<Box<dyn FnOnce() -> Option<Box<dyn Any>>>>>,
    monitors: RefCell<Vec<Box<dyn Any>>>,
}

impl Scope {
    /// The scope's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope's dot-joined path from its root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The nodes registered in this scope, in construction order.
    pub fn nodes(&self) -> Vec<Rc<dyn BaseNode>> {
        self.nodes.borrow().clone()
    }

    /// The child scopes opened inside this scope, in order.
    pub fn children(&self) -> Vec<Rc<Scope>> {
        self.children.borrow().clone()
    }

    /// Applies this scope's deferred wiring actions, then its children's.
    ///
    /// Each action resolves the lazy fields of the two nodes it connects,
    /// builds the monitor when one was requested, and performs the physical
    /// wiring. Actions run at most once.
    pub fn apply_wiring(&self) {
        let wiring: Vec<_> = self.wiring.borrow_mut().drain(..).collect();
        for action in wiring {
            if let Some(monitor) = action() {
                self.monitors.borrow_mut().push(monitor);
            }
        }
        for child in self.children() {
            child.apply_wiring();
        }
    }

    /// The monitors constructed by this scope's wiring actions.
    pub fn monitors(&self) -> Ref<'_, Vec<Box<dyn Any>>> {
        self.monitors.borrow()
    }

    pub(crate) fn elab(&self) -> Option<Rc<ElabInner>> {
        self.elab.upgrade()
    }

    pub(crate) fn allocate_index(&self) -> usize {
        let index = self.counter.get();
        self.counter.set(index + 1);
        index
    }

    pub(crate) fn register_node(&self, node: Rc<dyn BaseNode>) {
        self.nodes.borrow_mut().push(node);
    }

    pub(crate) fn defer(&self, action: Box<dyn FnOnce() -> Option<Box<dyn Any>>>) {
        self.wiring.borrow_mut().push(action);
    }
}
