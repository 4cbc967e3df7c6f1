// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scoped disposal container.

use core::fmt;

use parking_lot::Mutex;

type Action = Box<dyn FnOnce() + Send>;

/// Release actions tied to the lifetime of a wrapped action stream.
///
/// Interaction logic receives a `&DisposeBag` and registers whatever it must
/// undo (subscriptions, timers, held resources). The bag is disposed when the
/// stream terminates, whatever the cause.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use understory_presenter::DisposeBag;
///
/// let released = Arc::new(AtomicUsize::new(0));
/// let bag = DisposeBag::new();
/// let r = released.clone();
/// bag.insert(move || {
///     r.fetch_add(1, Ordering::SeqCst);
/// });
/// bag.dispose();
/// bag.dispose();
/// assert_eq!(released.load(Ordering::SeqCst), 1);
/// assert!(bag.is_disposed());
/// ```
pub struct DisposeBag {
    // `None` once disposed.
    actions: Mutex<Option<Vec<Action>>>,
}

impl DisposeBag {
    /// Create an empty, live bag.
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Some(Vec::new())),
        }
    }

    /// Register a release action. Runs it immediately if the bag is already disposed.
    pub fn insert(&self, action: impl FnOnce() + Send + 'static) {
        let mut actions = self.actions.lock();
        match actions.as_mut() {
            Some(pending) => pending.push(Box::new(action)),
            None => {
                drop(actions);
                action();
            }
        }
    }

    /// Keep `value` alive until the bag is disposed.
    pub fn hold<T: Send + 'static>(&self, value: T) {
        self.insert(move || drop(value));
    }

    /// Run every release action in insertion order. Later calls do nothing.
    pub fn dispose(&self) {
        let actions = self.actions.lock().take();
        for action in actions.into_iter().flatten() {
            action();
        }
    }

    /// Returns true once [`DisposeBag::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.actions.lock().is_none()
    }

    /// Number of pending release actions.
    pub fn len(&self) -> usize {
        self.actions.lock().as_ref().map_or(0, Vec::len)
    }

    /// Returns true if no release action is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DisposeBag {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeBag")
            .field("pending", &self.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
