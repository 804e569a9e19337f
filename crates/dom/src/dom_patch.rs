//! Incremental DOM patch protocol.
//!
//! The host page drives the tree exclusively through ordered batches of
//! `DomPatch` operations; every batch is one unit of mutation delivery for
//! observers (see `session`).
//!
//! Invariants:
//! - Patches are applied in order.
//! - References must point to existing keys at the time they are used (except
//!   the `key` in create operations).
//! - Child ordering is explicit and deterministic.
//! - `DomPatch::Clear` is only valid as the first patch of a batch.
//! - Element and attribute names are expected to be canonical ASCII-lowercase.
//! - All `PatchKey` values used in patches must be non-zero (`PatchKey::INVALID`
//!   is never valid in a patch stream).
//! - Host keys are allocated upwards from 1; keys from `PatchKey::INTERNAL_TOP`
//!   downwards are reserved for nodes created by the tree itself.
//! - Attribute order and duplicates are preserved; appliers must not dedupe.
//! - Operations must not create cycles; a node may have at most one parent.

use crate::types::Id;
use std::fmt;
use std::sync::Arc;

/// Opaque patch-layer key for stable node identity within a document.
///
/// Keys are never reused once allocated, so a key identifies one node for the
/// whole lifetime of a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PatchKey(pub u32);

impl PatchKey {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: PatchKey = PatchKey(0);

    /// First key handed out for nodes the tree creates on its own behalf.
    pub const INTERNAL_TOP: PatchKey = PatchKey(u32::MAX);

    pub fn id(self) -> Id {
        Id(self.0)
    }
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Incremental DOM patch operation.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum DomPatch {
    /// Clear all existing nodes for the document before applying subsequent patches.
    ///
    /// Clearing does not release keys: keys allocated before the clear stay
    /// reserved so node identity is never reused.
    Clear,
    /// Create a document root node.
    CreateDocument {
        key: PatchKey,
        #[cfg_attr(feature = "serde", serde(default))]
        doctype: Option<String>,
    },
    /// Create an element node with initial attributes.
    CreateElement {
        key: PatchKey,
        name: Arc<str>,
        #[cfg_attr(feature = "serde", serde(default))]
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    /// Create a text node.
    CreateText { key: PatchKey, text: String },
    /// Create a comment node.
    CreateComment { key: PatchKey, text: String },
    /// Append a child to the end of a parent's children list.
    AppendChild { parent: PatchKey, child: PatchKey },
    /// Insert a child before an existing sibling.
    InsertBefore {
        parent: PatchKey,
        child: PatchKey,
        before: PatchKey,
    },
    /// Detach a node and its entire subtree from its parent.
    ///
    /// The subtree keeps its keys: a later `AppendChild`/`InsertBefore` of the
    /// same key moves it back into the document with its identity intact.
    RemoveNode { key: PatchKey },
    /// Replace all attributes on an element node.
    ///
    /// Applying this to a non-element node is a deterministic error.
    SetAttributes {
        key: PatchKey,
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    /// Replace the text content of a text node.
    ///
    /// Applying this to a non-text node is a deterministic error.
    SetText { key: PatchKey, text: String },
}
