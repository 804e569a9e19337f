use dom::{PatchKey, TreeCapability};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub seen: bool,
}

/// Per-node "already handled" state, keyed by node identity.
///
/// Lives outside the tree, so rewriting a node's content (or moving it)
/// never loses its record. Records are only ever created as seen and are
/// never flipped back.
///
/// The store also remembers the emphasis elements annotation created, so a
/// later pass over an enclosing or nested block never wraps them again.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    records: HashMap<PatchKey, AnnotationRecord>,
    emphasis: HashSet<PatchKey>,
}

pub type SharedAnnotationStore = Rc<RefCell<AnnotationStore>>;

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedAnnotationStore {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn is_seen(&self, key: PatchKey) -> bool {
        self.records.get(&key).is_some_and(|r| r.seen)
    }

    pub fn mark_seen(&mut self, key: PatchKey) {
        self.records.entry(key).or_default().seen = true;
    }

    pub fn mark_emphasis(&mut self, key: PatchKey) {
        self.emphasis.insert(key);
    }

    pub fn is_emphasis(&self, key: PatchKey) -> bool {
        self.emphasis.contains(&key)
    }

    /// True when some strict ancestor of `key` is an emphasis element.
    pub fn inside_emphasis<T: TreeCapability>(&self, tree: &T, key: PatchKey) -> bool {
        if self.emphasis.is_empty() {
            return false;
        }
        tree.closest_ancestor(key, |_, a| self.emphasis.contains(&a)).is_some()
    }

    pub fn record(&self, key: PatchKey) -> Option<AnnotationRecord> {
        self.records.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget everything. Only meant for tearing down between sessions.
    pub fn clear(&mut self) {
        self.records.clear();
        self.emphasis.clear();
    }

    /// Drop records of nodes that are no longer part of the document.
    /// Returns how many were dropped.
    pub fn prune_detached<T: TreeCapability>(&mut self, tree: &T) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| tree.is_attached(*key));
        self.emphasis.retain(|key| tree.is_attached(*key));
        let dropped = before - self.records.len();
        if dropped > 0 {
            log::debug!(target: "review.annotator", "pruned {dropped} stale annotation records");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::{AnnotationRecord, AnnotationStore};
    use dom::{DomPatch, DomTree, PatchKey};
    use std::sync::Arc;

    #[test]
    fn mark_seen_is_sticky_and_idempotent() {
        let mut store = AnnotationStore::new();
        let key = PatchKey(7);
        assert!(!store.is_seen(key));
        assert_eq!(store.record(key), None);

        store.mark_seen(key);
        store.mark_seen(key);
        assert!(store.is_seen(key));
        assert_eq!(store.record(key), Some(AnnotationRecord { seen: true }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn prune_drops_only_detached_nodes() {
        let mut tree = DomTree::new();
        let p = |key| DomPatch::CreateElement {
            key: PatchKey(key),
            name: Arc::from("p"),
            attributes: Vec::new(),
        };
        tree.apply(&[
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: None,
            },
            p(2),
            p(3),
            DomPatch::AppendChild {
                parent: PatchKey(1),
                child: PatchKey(2),
            },
        ])
        .unwrap();

        let mut store = AnnotationStore::new();
        store.mark_seen(PatchKey(2));
        store.mark_seen(PatchKey(3));
        store.mark_seen(PatchKey(99));
        assert_eq!(store.prune_detached(&tree), 2);
        assert!(store.is_seen(PatchKey(2)));
        assert!(!store.is_seen(PatchKey(3)));
    }

    #[test]
    fn emphasis_marks_shadow_their_subtree_and_are_pruned() {
        let mut tree = DomTree::new();
        tree.apply(&[
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: None,
            },
            DomPatch::CreateElement {
                key: PatchKey(2),
                name: Arc::from("span"),
                attributes: Vec::new(),
            },
            DomPatch::CreateText {
                key: PatchKey(3),
                text: "search".to_string(),
            },
            DomPatch::AppendChild {
                parent: PatchKey(1),
                child: PatchKey(2),
            },
            DomPatch::AppendChild {
                parent: PatchKey(2),
                child: PatchKey(3),
            },
        ])
        .unwrap();

        let mut store = AnnotationStore::new();
        assert!(!store.inside_emphasis(&tree, PatchKey(3)));
        store.mark_emphasis(PatchKey(2));
        assert!(store.is_emphasis(PatchKey(2)));
        assert!(store.inside_emphasis(&tree, PatchKey(3)));
        assert!(!store.inside_emphasis(&tree, PatchKey(2)));

        tree.apply(&[DomPatch::RemoveNode { key: PatchKey(2) }]).unwrap();
        store.prune_detached(&tree);
        assert!(!store.is_emphasis(PatchKey(2)));
    }
}
