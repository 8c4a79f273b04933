//! A registry of named, typed, buffering event loggers.
//!
//! Components that want to report structured events hold a [`Logger`] and call
//! [`Logger::log`]; consumers bind an action to a stream name in the
//! [`Registry`] before the events are produced. Events are buffered and
//! presented to the action in batches of `(elapsed, event)` pairs with
//! non-decreasing timestamps.

#![forbid(missing_docs)]

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A named collection of typed loggers.
pub struct Registry {
    /// An instant common to all logging statements.
    time: Instant,
    /// A map from names to typed loggers, with a flushable alias of each.
    map: HashMap<String, (Box<dyn Any>, Box<dyn Flush>)>,
}

impl Registry {
    /// Binds a log name to an action on batches of log events.
    ///
    /// This method returns any pre-installed logger for the name rather than
    /// overwriting it: loggers already handed out keep their old destination,
    /// and only newly acquired loggers see the new one.
    ///
    /// The action is called with a timestamp that lower-bounds any event it
    /// could see next, as well as a batch of timestamped events. An empty
    /// batch signals a flush.
    pub fn insert<T: 'static, F: Fn(&Duration, &[(Duration, T)]) + 'static>(
        &mut self,
        name: &str,
        action: F,
    ) -> Option<Box<dyn Any>> {
        let logger = Logger::<T>::new(self.time, action);
        self.map
            .insert(name.to_owned(), (Box::new(logger.clone()), Box::new(logger)))
            .map(|(logger, _flush)| logger)
    }

    /// Removes a bound logger, so that the stream can be observed as complete.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any>> {
        self.map.remove(name).map(|(logger, _flush)| logger)
    }

    /// Retrieves a shared logger, if one has been inserted under `name`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Logger<T>> {
        self.map
            .get(name)
            .and_then(|(logger, _flush)| logger.downcast_ref::<Logger<T>>())
            .cloned()
    }

    /// Flushes all registered loggers.
    pub fn flush(&mut self) {
        for (_logger, flush) in self.map.values() {
            flush.flush();
        }
    }

    /// Creates a new registry whose loggers measure time from `time`.
    pub fn new(time: Instant) -> Self {
        Registry {
            time,
            map: HashMap::new(),
        }
    }
}

/// Types which can flush out buffered state.
trait Flush {
    fn flush(&self);
}

/// A buffering logger for events of type `T`.
pub struct Logger<T> {
    time: Instant,
    action: Rc<dyn Fn(&Duration, &[(Duration, T)])>,
    buffer: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T> Clone for Logger<T> {
    fn clone(&self) -> Self {
        Logger {
            time: self.time,
            action: Rc::clone(&self.action),
            buffer: Rc::clone(&self.buffer),
        }
    }
}

impl<T> Logger<T> {
    /// Allocates a new shareable logger bound to a write destination.
    pub fn new<F: Fn(&Duration, &[(Duration, T)]) + 'static>(time: Instant, action: F) -> Self {
        Logger {
            time,
            action: Rc::new(action),
            buffer: Rc::new(RefCell::new(Vec::with_capacity(1024))),
        }
    }

    /// Logs an event.
    ///
    /// The event has its timestamp recorded at the moment of logging, but it
    /// may be delayed due to buffering. It will be presented to the action
    /// when the buffer reaches capacity or on the next flush.
    pub fn log(&self, event: T) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == buffer.capacity() {
            (self.action)(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Flushes buffered events and communicates the new lower bound.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        (self.action)(&self.time.elapsed(), &buffer[..]);
        buffer.clear();
    }
}

impl<T> Flush for Logger<T> {
    fn flush(&self) {
        Logger::flush(self);
    }
}
