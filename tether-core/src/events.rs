//! Synchronous listener registry backing every event surface in tether.
//!
//! Handlers run on the caller's thread, in registration order, and an
//! emission completes before the emitting call returns — there is no
//! queueing and no deferral. Emission iterates a snapshot of the registry,
//! so a handler may register or cancel subscriptions (including its own)
//! while an emission is in flight; newly registered handlers are first
//! invoked on the *next* emission.
//!
//! A [`Subscription`] removes its handler deterministically, either via
//! [`Subscription::cancel`] or when the subscription is dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<E> = Rc<RefCell<dyn FnMut(&E)>>;
type Registry<E> = RefCell<Vec<(u64, Handler<E>)>>;

/// Synchronous, single-threaded event emitter.
///
/// Clones share the same registry, so any clone may register handlers or
/// emit. Intentionally `!Send`: all of tether runs on one logical thread.
pub struct Emitter<E> {
    registry: Rc<Registry<E>>,
    next_id: Rc<Cell<u64>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Number of currently registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Invoke every registered handler with `event`, in registration order.
    ///
    /// If a handler (transitively) emits on the emitter it is registered
    /// with, the nested emission runs the *other* handlers but skips the
    /// one currently executing — a handler is never re-entered.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .registry
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in snapshot {
            match handler.try_borrow_mut() {
                Ok(mut handler) => (&mut *handler)(event),
                Err(_) => log::debug!("skipping re-entrant event handler"),
            }
        }
    }
}

impl<E: 'static> Emitter<E> {
    /// Register `handler` and return the subscription that owns it.
    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let boxed: Handler<E> = Rc::new(RefCell::new(handler));
        self.registry.borrow_mut().push((id, boxed));

        let weak: Weak<Registry<E>> = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("handlers", &self.registry.borrow().len())
            .finish()
    }
}

/// Handle to a registered event handler.
///
/// The handler stays registered for exactly as long as the subscription is
/// alive; dropping it (or calling [`cancel`](Self::cancel)) removes the
/// handler before returning.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Explicitly unregister the handler. Equivalent to dropping.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
