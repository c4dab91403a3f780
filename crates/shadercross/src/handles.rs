//! Live-handle accounting for the objects a pipeline call owns.
//!
//! Every parsed module, validation result and generated output is held in a [`Tracked`] for
//! the duration of a call. Dropping the handle releases the object and decrements the
//! per-thread counter, so [`live_handles`] returning to its previous value proves a call
//! released everything it created on every exit path.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};

thread_local! {
    static LIVE_HANDLES: Cell<usize> = const { Cell::new(0) };
}

/// Number of [`Tracked`] handles currently alive on this thread.
pub fn live_handles() -> usize {
    LIVE_HANDLES.with(Cell::get)
}

/// Owns a value and counts it as a live handle until dropped.
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self {
        LIVE_HANDLES.with(|count| count.set(count.get() + 1));
        Self { value }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        LIVE_HANDLES.with(|count| count.set(count.get().saturating_sub(1)));
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
