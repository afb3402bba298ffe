//! Task filtering: restrict firing to marked tasks.
//!
//! A config with `task_filter` set only fires for invocations whose task is
//! marked.  The default [`ThreadMarks`] filter treats each OS thread as a
//! task and keeps the mark in a thread-local.

use std::cell::Cell;

thread_local! {
    static MARKED: Cell<bool> = const { Cell::new(false) };
}

/// Source of the per-task "marked for fault injection" flag.
pub trait TaskFilter: Send + Sync {
    fn is_marked(&self) -> bool;
}

impl<F> TaskFilter for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_marked(&self) -> bool {
        self()
    }
}

/// Per-thread marks set with [`mark_current_thread`] or [`MarkGuard`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadMarks;

impl TaskFilter for ThreadMarks {
    fn is_marked(&self) -> bool {
        is_current_thread_marked()
    }
}

/// Mark or unmark the calling thread.
pub fn mark_current_thread(marked: bool) {
    MARKED.with(|m| m.set(marked));
}

pub fn is_current_thread_marked() -> bool {
    MARKED.with(Cell::get)
}

/// Marks the current thread for its lifetime, restoring the previous mark
/// on drop.
#[derive(Debug)]
pub struct MarkGuard {
    previous: bool,
}

impl MarkGuard {
    pub fn new() -> Self {
        let previous = is_current_thread_marked();
        mark_current_thread(true);
        Self { previous }
    }
}

impl Default for MarkGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MarkGuard {
    fn drop(&mut self) {
        mark_current_thread(self.previous);
    }
}
