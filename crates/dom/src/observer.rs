use crate::dom_patch::PatchKey;

/// One child-list change: nodes inserted under and/or removed from `target`.
///
/// `added` lists only the roots of inserted subtrees, in insertion order;
/// descendants that came along with them are not listed separately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: PatchKey,
    pub added: Vec<PatchKey>,
    pub removed: Vec<PatchKey>,
}

impl MutationRecord {
    pub fn inserted(target: PatchKey, added: Vec<PatchKey>) -> Self {
        Self {
            target,
            added,
            removed: Vec::new(),
        }
    }

    pub fn removed(target: PatchKey, removed: Vec<PatchKey>) -> Self {
        Self {
            target,
            added: Vec::new(),
            removed,
        }
    }
}

/// Iterate every inserted node of a batch, in the order the host reported them.
pub fn added_nodes(batch: &[MutationRecord]) -> impl Iterator<Item = PatchKey> + '_ {
    batch.iter().flat_map(|r| r.added.iter().copied())
}
