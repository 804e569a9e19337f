//! Single-threaded host for a live document and its mutation observers.
//!
//! The session plays the role of the page runtime: it applies patch batches
//! and then delivers the resulting `MutationRecord`s to every active
//! observer, once per batch. Observer callbacks receive `&mut DomTree` and
//! may mutate the tree; records they produce are delivered in a following
//! round, never re-entrantly.

use crate::capability::TreeCapability;
use crate::dom_patch::{DomPatch, PatchKey};
use crate::error::DomPatchError;
use crate::observer::MutationRecord;
use crate::tree::DomTree;
use std::cell::Cell;
use std::rc::Rc;

/// Upper bound on delivery rounds per flush. Observers that keep producing
/// records they themselves react to would otherwise never settle.
pub const MAX_FLUSH_ROUNDS: usize = 32;

pub type BatchCallback = Box<dyn FnMut(&mut DomTree, &[MutationRecord])>;

struct Observer {
    id: u64,
    root: PatchKey,
    subtree: bool,
    active: Rc<Cell<bool>>,
    callback: BatchCallback,
}

impl Observer {
    fn wants(&self, tree: &DomTree, record: &MutationRecord) -> bool {
        if self.subtree {
            tree.is_inclusive_ancestor(self.root, record.target)
        } else {
            record.target == self.root
        }
    }
}

/// Handle to an observer registration.
///
/// Dropping the handle does not end the subscription; it lives as long as
/// the session unless `unsubscribe` is called.
#[derive(Clone, Debug)]
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop deliveries. Takes effect before the next batch is delivered,
    /// including a batch already being flushed.
    pub fn unsubscribe(&self) {
        if self.active.replace(false) {
            log::debug!(target: "dom.session", "observer {} unsubscribed", self.id);
        }
    }
}

/// Delivery statistics of one `flush`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub rounds: usize,
    pub records: usize,
    pub deliveries: usize,
}

pub struct Session {
    tree: DomTree,
    observers: Vec<Observer>,
    next_observer: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::with_tree(DomTree::new())
    }

    pub fn with_tree(tree: DomTree) -> Self {
        Self {
            tree,
            observers: Vec::new(),
            next_observer: 1,
        }
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Direct tree access. Structural changes made here are queued like any
    /// other and reach observers on the next `flush`.
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn observer_count(&self) -> usize {
        self.observers.iter().filter(|o| o.active.get()).count()
    }

    /// Apply one host batch and deliver the resulting records.
    ///
    /// Records produced before a failing patch are still delivered, so
    /// observers never miss nodes that did make it into the document.
    pub fn apply(&mut self, patches: &[DomPatch]) -> Result<FlushStats, DomPatchError> {
        let result = self.tree.apply(patches);
        let stats = self.flush();
        result.map(|()| stats)
    }

    /// Register `callback` for child-list changes at `root` (or anywhere
    /// below it when `subtree` is set).
    pub fn subscribe<F>(&mut self, root: PatchKey, subtree: bool, callback: F) -> Subscription
    where
        F: FnMut(&mut DomTree, &[MutationRecord]) + 'static,
    {
        let id = self.next_observer;
        self.next_observer += 1;
        let active = Rc::new(Cell::new(true));
        self.observers.push(Observer {
            id,
            root,
            subtree,
            active: Rc::clone(&active),
            callback: Box::new(callback),
        });
        log::debug!(target: "dom.session", "observer {id} subscribed at {root} (subtree={subtree})");
        Subscription { id, active }
    }

    /// Deliver pending records until the tree is quiescent.
    pub fn flush(&mut self) -> FlushStats {
        let mut stats = FlushStats::default();
        while self.tree.has_pending_records() {
            if stats.rounds == MAX_FLUSH_ROUNDS {
                let dropped = self.tree.take_records().len();
                log::warn!(
                    target: "dom.session",
                    "observers did not settle after {MAX_FLUSH_ROUNDS} rounds; dropping {dropped} records"
                );
                break;
            }
            stats.rounds += 1;
            let records = self.tree.take_records();
            stats.records += records.len();
            self.observers.retain(|o| o.active.get());

            for observer in self.observers.iter_mut() {
                if !observer.active.get() {
                    continue;
                }
                let batch: Vec<MutationRecord> = records
                    .iter()
                    .filter(|r| observer.wants(&self.tree, r))
                    .cloned()
                    .collect();
                if batch.is_empty() {
                    continue;
                }
                log::trace!(
                    target: "dom.session",
                    "delivering {} records to observer {}",
                    batch.len(),
                    observer.id
                );
                (observer.callback)(&mut self.tree, &batch);
                stats.deliveries += 1;
            }
        }
        stats
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
