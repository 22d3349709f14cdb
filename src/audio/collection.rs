// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A list whose membership only changes at block boundaries.
//!
//! Producers stage additions and removals through a shared [`ChangeQueue`]
//! while the owner iterates a stable list. The owner calls
//! [`DiscreteTimeCollection::apply`] once per block to fold the staged changes
//! in, so a mix pass never sees an item appear or vanish halfway through.

use std::sync::Arc;

use parking_lot::Mutex;

struct Changes<T> {
    added: Vec<T>,
    removed: Vec<T>,
}

/// Staged changes, safe to push from any thread.
pub struct ChangeQueue<T> {
    changes: Mutex<Changes<T>>,
}

impl<T> ChangeQueue<T> {
    pub fn new() -> Self {
        Self {
            changes: Mutex::new(Changes {
                added: Vec::new(),
                removed: Vec::new(),
            }),
        }
    }

    /// Stages an item to be added at the next apply.
    pub fn add(&self, item: T) {
        self.changes.lock().added.push(item);
    }

    /// Stages an item to be removed at the next apply.
    pub fn remove(&self, item: T) {
        self.changes.lock().removed.push(item);
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        let changes = self.changes.lock();
        changes.added.is_empty() && changes.removed.is_empty()
    }
}

impl<T> Default for ChangeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The owner's side: the live list plus spare buffers that staged changes are
/// swapped into, so applying changes does not allocate once warmed up.
pub struct DiscreteTimeCollection<T> {
    items: Vec<T>,
    queue: Arc<ChangeQueue<T>>,
    staged_added: Vec<T>,
    staged_removed: Vec<T>,
}

impl<T: PartialEq> DiscreteTimeCollection<T> {
    pub fn new() -> Self {
        Self::with_queue(Arc::new(ChangeQueue::new()))
    }

    /// Creates a collection fed by an existing queue.
    pub fn with_queue(queue: Arc<ChangeQueue<T>>) -> Self {
        Self {
            items: Vec::new(),
            queue,
            staged_added: Vec::new(),
            staged_removed: Vec::new(),
        }
    }

    /// The queue producers push into.
    pub fn queue(&self) -> &Arc<ChangeQueue<T>> {
        &self.queue
    }

    pub fn add(&self, item: T) {
        self.queue.add(item);
    }

    pub fn remove(&self, item: T) {
        self.queue.remove(item);
    }

    /// Folds staged changes into the live list. Returns true if anything was staged.
    ///
    /// Additions land before removals, so an item both added and removed
    /// within one block never becomes visible. Duplicate additions of an
    /// item that is already present are ignored.
    pub fn apply(&mut self) -> bool {
        {
            let mut changes = self.queue.changes.lock();
            if changes.added.is_empty() && changes.removed.is_empty() {
                return false;
            }
            std::mem::swap(&mut changes.added, &mut self.staged_added);
            std::mem::swap(&mut changes.removed, &mut self.staged_removed);
        }

        for item in self.staged_added.drain(..) {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
        if !self.staged_removed.is_empty() {
            let removed = &self.staged_removed;
            self.items.retain(|item| !removed.contains(item));
            self.staged_removed.clear();
        }
        true
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Drops live items immediately, bypassing the queue. Only the owner may do this.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.items.retain(f);
    }

    /// Removes and returns the live item at `index`.
    pub fn remove_at(&mut self, index: usize) -> T {
        self.items.remove(index)
    }
}

impl<T: PartialEq> Default for DiscreteTimeCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}
