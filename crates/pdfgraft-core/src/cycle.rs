//! Visited-set tracking for recursive object graph walks.
//!
//! A guard belongs to one top-level traversal. Callers `enter` an object
//! before descending into it and `leave` it on the way back up, so the set
//! always holds the current path and only true back-edges are reported.

use crate::report::{Warning, Warnings};
use lopdf::ObjectId;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct CycleGuard {
    visited: HashSet<ObjectId>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as being visited. Returns `false` if it is already on the path.
    pub fn enter(&mut self, id: ObjectId) -> bool {
        self.visited.insert(id)
    }

    /// Like [`CycleGuard::enter`], recording a warning when the branch must be cut.
    pub fn enter_or_warn(
        &mut self,
        id: ObjectId,
        context: &'static str,
        warnings: &mut Warnings,
    ) -> bool {
        if self.enter(id) {
            true
        } else {
            warnings.push(Warning::CircularDependency {
                object: id,
                context,
            });
            false
        }
    }

    pub fn leave(&mut self, id: ObjectId) {
        self.visited.remove(&id);
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.visited.contains(&id)
    }

    pub fn depth(&self) -> usize {
        self.visited.len()
    }
}
