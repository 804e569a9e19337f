use crate::dom_patch::PatchKey;
use thiserror::Error;

/// Protocol violations while applying a patch batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomPatchError {
    #[error("patch key {0} is reserved and cannot be used")]
    InvalidKey(PatchKey),
    #[error("patch key {0} was already allocated")]
    DuplicateKey(PatchKey),
    #[error("patch key {0} does not name a node")]
    MissingKey(PatchKey),
    #[error("node {0} has the wrong kind for this operation")]
    WrongNodeKind(PatchKey),
    #[error("node {0} cannot take this parent/child relation")]
    InvalidParent(PatchKey),
    #[error("node {before} is not a child of {parent}")]
    InvalidSibling { parent: PatchKey, before: PatchKey },
    #[error("appending {child} under {parent} would create a cycle")]
    CycleDetected { parent: PatchKey, child: PatchKey },
    #[error("clear must be the first patch of a batch")]
    MidStreamClear,
    #[error("document has no root node")]
    MissingRoot,
}

/// Failures of capability-level reads and writes on a single node.
///
/// Callers processing many nodes treat these as "abandon this node" and move
/// on; none of them leave the tree in a partially applied state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0} does not exist")]
    MissingKey(PatchKey),
    #[error("node {0} is no longer attached to the document")]
    Detached(PatchKey),
    #[error("node {0} has the wrong kind for this operation")]
    WrongNodeKind(PatchKey),
}
