//! Weak handles for closures that cross the executor boundary.
//!
//! Completion and damage closures outlive the protocol objects they refer to
//! and must be `Send`, so they cannot carry `Weak<T>` directly. Instead every
//! live frame and manager registers a numeric handle in a registry local to
//! the dispatch thread; a closure captures only the handle and resolves it
//! after re-entering the dispatch context. An object that died in the
//! interim simply no longer resolves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) fn next_handle() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// The live objects of one dispatch thread, by handle.
pub(crate) struct LiveSet<T> {
    entries: RefCell<HashMap<u64, Weak<T>>>,
}

impl<T> Default for LiveSet<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<T> LiveSet<T> {
    pub fn insert(&self, handle: u64, object: &Rc<T>) {
        self.entries
            .borrow_mut()
            .insert(handle, Rc::downgrade(object));
    }

    pub fn remove(&self, handle: u64) {
        self.entries.borrow_mut().remove(&handle);
    }

    pub fn resolve(&self, handle: u64) -> Option<Rc<T>> {
        self.entries.borrow().get(&handle).and_then(Weak::upgrade)
    }
}
