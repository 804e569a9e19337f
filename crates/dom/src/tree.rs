use crate::capability::{Fragment, TreeCapability, TreeMutation};
use crate::dom_patch::{DomPatch, PatchKey};
use crate::error::{DomError, DomPatchError};
use crate::observer::MutationRecord;
use crate::types::{Node, NodeType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Arena-backed live document.
///
/// Nodes are created through `DomPatch` batches (host side) or through
/// `TreeMutation` (tree-side rewrites). Every structural change is recorded
/// as a `MutationRecord` until `take_records` drains them.
pub struct DomTree {
    arena: DomArena,
    root: Option<PatchKey>,
    records: Vec<MutationRecord>,
}

impl DomTree {
    pub fn new() -> Self {
        Self {
            arena: DomArena::new(),
            root: None,
            records: Vec::new(),
        }
    }

    pub fn apply(&mut self, patches: &[DomPatch]) -> Result<(), DomPatchError> {
        for (i, patch) in patches.iter().enumerate() {
            if matches!(patch, DomPatch::Clear) && i != 0 {
                return Err(DomPatchError::MidStreamClear);
            }
            self.apply_one(patch)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, patch: &DomPatch) -> Result<(), DomPatchError> {
        match patch {
            DomPatch::Clear => {
                log::trace!(target: "dom.tree", "clear");
                self.arena.clear();
                self.root = None;
                self.records.clear();
            }
            DomPatch::CreateDocument { key, doctype } => {
                self.ensure_key(*key)?;
                self.arena.insert_node(
                    *key,
                    NodeKind::Document {
                        doctype: doctype.clone(),
                    },
                )?;
                self.root = Some(*key);
            }
            DomPatch::CreateElement {
                key,
                name,
                attributes,
            } => {
                self.ensure_key(*key)?;
                self.arena.insert_node(
                    *key,
                    NodeKind::Element {
                        name: Arc::clone(name),
                        attributes: attributes.clone(),
                        style: Vec::new(),
                    },
                )?;
            }
            DomPatch::CreateText { key, text } => {
                self.ensure_key(*key)?;
                self.arena
                    .insert_node(*key, NodeKind::Text { text: text.clone() })?;
            }
            DomPatch::CreateComment { key, text } => {
                self.ensure_key(*key)?;
                self.arena
                    .insert_node(*key, NodeKind::Comment { text: text.clone() })?;
            }
            DomPatch::AppendChild { parent, child } => {
                self.ensure_live(*parent)?;
                self.ensure_live(*child)?;
                self.arena.append_child(*parent, *child)?;
                self.records.push(MutationRecord::inserted(*parent, vec![*child]));
            }
            DomPatch::InsertBefore {
                parent,
                child,
                before,
            } => {
                self.ensure_live(*parent)?;
                self.ensure_live(*child)?;
                self.ensure_live(*before)?;
                self.arena.insert_before(*parent, *child, *before)?;
                self.records.push(MutationRecord::inserted(*parent, vec![*child]));
            }
            DomPatch::RemoveNode { key } => {
                self.ensure_live(*key)?;
                if self.root == Some(*key) {
                    self.root = None;
                }
                if let Some(parent) = self.arena.detach(*key)? {
                    self.records.push(MutationRecord::removed(parent, vec![*key]));
                }
            }
            DomPatch::SetAttributes { key, attributes } => {
                self.ensure_live(*key)?;
                self.arena.set_attributes(*key, attributes)?;
            }
            DomPatch::SetText { key, text } => {
                self.ensure_live(*key)?;
                self.arena.set_text(*key, text)?;
            }
        }
        Ok(())
    }

    fn ensure_key(&self, key: PatchKey) -> Result<(), DomPatchError> {
        if key == PatchKey::INVALID {
            return Err(DomPatchError::InvalidKey(key));
        }
        Ok(())
    }

    fn ensure_live(&self, key: PatchKey) -> Result<(), DomPatchError> {
        self.ensure_key(key)?;
        if !self.arena.live.contains_key(&key) {
            return Err(DomPatchError::MissingKey(key));
        }
        Ok(())
    }

    /// Drain the mutation records produced since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.arena.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.live.is_empty()
    }

    pub fn materialize(&self, key: PatchKey) -> Result<Node, DomPatchError> {
        self.arena.materialize(key)
    }

    pub fn materialize_root(&self) -> Result<Node, DomPatchError> {
        let Some(root) = self.root else {
            return Err(DomPatchError::MissingRoot);
        };
        self.arena.materialize(root)
    }

    fn ensure_attached(&self, key: PatchKey) -> Result<(), DomError> {
        if !self.arena.live.contains_key(&key) {
            return Err(DomError::MissingKey(key));
        }
        if !self.is_attached(key) {
            return Err(DomError::Detached(key));
        }
        Ok(())
    }

    fn build_fragment(&mut self, fragment: Fragment) -> PatchKey {
        match fragment {
            Fragment::Text(text) => self.arena.insert_internal(NodeKind::Text { text }),
            Fragment::Element {
                name,
                attributes,
                style,
                children,
            } => {
                let key = self.arena.insert_internal(NodeKind::Element {
                    name,
                    attributes,
                    style,
                });
                for child in children {
                    let child_key = self.build_fragment(child);
                    self.arena.link_last(key, child_key);
                }
                key
            }
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeCapability for DomTree {
    fn root(&self) -> Option<PatchKey> {
        self.root
    }

    fn node_type(&self, key: PatchKey) -> Option<NodeType> {
        self.arena.record(key).map(|r| r.kind.node_type())
    }

    fn parent(&self, key: PatchKey) -> Option<PatchKey> {
        self.arena.record(key).and_then(|r| r.parent)
    }

    fn children(&self, key: PatchKey) -> &[PatchKey] {
        self.arena
            .record(key)
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    fn tag_name(&self, key: PatchKey) -> Option<&str> {
        match &self.arena.record(key)?.kind {
            NodeKind::Element { name, .. } => Some(name.as_ref()),
            _ => None,
        }
    }

    fn attributes(&self, key: PatchKey) -> &[(Arc<str>, Option<String>)] {
        match self.arena.record(key).map(|r| &r.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.as_slice(),
            _ => &[],
        }
    }

    fn text(&self, key: PatchKey) -> Option<&str> {
        match &self.arena.record(key)?.kind {
            NodeKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    fn style(&self, key: PatchKey) -> &[(String, String)] {
        match self.arena.record(key).map(|r| &r.kind) {
            Some(NodeKind::Element { style, .. }) => style.as_slice(),
            _ => &[],
        }
    }
}

impl TreeMutation for DomTree {
    fn set_style(&mut self, key: PatchKey, property: &str, value: &str) -> Result<(), DomError> {
        self.ensure_attached(key)?;
        let style = self.arena.style_mut(key)?;
        if let Some(entry) = style
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
        {
            entry.1.clear();
            entry.1.push_str(value);
        } else {
            style.push((property.to_string(), value.to_string()));
        }
        Ok(())
    }

    fn remove_style(&mut self, key: PatchKey, property: &str) -> Result<bool, DomError> {
        self.ensure_attached(key)?;
        let style = self.arena.style_mut(key)?;
        let before = style.len();
        style.retain(|(k, _)| !k.eq_ignore_ascii_case(property));
        Ok(style.len() != before)
    }

    fn replace_text_with(
        &mut self,
        key: PatchKey,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<PatchKey>, DomError> {
        self.ensure_attached(key)?;
        if self.node_type(key) != Some(NodeType::Text) {
            return Err(DomError::WrongNodeKind(key));
        }
        let parent = self.parent(key).ok_or(DomError::Detached(key))?;

        let added: Vec<PatchKey> = fragments
            .into_iter()
            .map(|f| self.build_fragment(f))
            .collect();
        self.arena.splice_child(parent, key, &added);
        log::trace!(
            target: "dom.tree",
            "replaced text {key} under {parent} with {} nodes",
            added.len()
        );
        self.records.push(MutationRecord {
            target: parent,
            added: added.clone(),
            removed: vec![key],
        });
        Ok(added)
    }
}

struct DomArena {
    nodes: Vec<NodeRecord>,
    live: HashMap<PatchKey, usize>,
    allocated: HashSet<PatchKey>,
    next_internal: u32,
}

impl DomArena {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            live: HashMap::new(),
            allocated: HashSet::new(),
            next_internal: PatchKey::INTERNAL_TOP.0,
        }
    }

    fn clear(&mut self) {
        // `allocated` survives so keys are never handed out twice.
        self.nodes.clear();
        self.live.clear();
    }

    fn record(&self, key: PatchKey) -> Option<&NodeRecord> {
        self.live.get(&key).map(|&i| &self.nodes[i])
    }

    fn index(&self, key: PatchKey) -> Result<usize, DomPatchError> {
        self.live
            .get(&key)
            .copied()
            .ok_or(DomPatchError::MissingKey(key))
    }

    fn insert_node(&mut self, key: PatchKey, kind: NodeKind) -> Result<(), DomPatchError> {
        if self.allocated.contains(&key) {
            return Err(DomPatchError::DuplicateKey(key));
        }
        self.push(key, kind);
        Ok(())
    }

    fn insert_internal(&mut self, kind: NodeKind) -> PatchKey {
        while self.allocated.contains(&PatchKey(self.next_internal)) {
            self.next_internal -= 1;
        }
        let key = PatchKey(self.next_internal);
        self.next_internal -= 1;
        self.push(key, kind);
        key
    }

    fn push(&mut self, key: PatchKey, kind: NodeKind) {
        let index = self.nodes.len();
        self.nodes.push(NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.allocated.insert(key);
        self.live.insert(key, index);
    }

    fn check_link(&self, parent: PatchKey, child: PatchKey) -> Result<(usize, usize), DomPatchError> {
        if parent == child || self.is_descendant(child, parent) {
            return Err(DomPatchError::CycleDetected { parent, child });
        }
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        if !self.nodes[parent_index].allows_children() {
            return Err(DomPatchError::InvalidParent(parent));
        }
        if matches!(self.nodes[child_index].kind, NodeKind::Document { .. }) {
            return Err(DomPatchError::InvalidParent(child));
        }
        if self.nodes[child_index].parent.is_some() {
            return Err(DomPatchError::InvalidParent(child));
        }
        Ok((parent_index, child_index))
    }

    fn append_child(&mut self, parent: PatchKey, child: PatchKey) -> Result<(), DomPatchError> {
        let (parent_index, child_index) = self.check_link(parent, child)?;
        self.nodes[parent_index].children.push(child);
        self.nodes[child_index].parent = Some(parent);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: PatchKey,
        child: PatchKey,
        before: PatchKey,
    ) -> Result<(), DomPatchError> {
        let (parent_index, child_index) = self.check_link(parent, child)?;
        let siblings = &mut self.nodes[parent_index].children;
        let pos = siblings
            .iter()
            .position(|k| *k == before)
            .ok_or(DomPatchError::InvalidSibling { parent, before })?;
        siblings.insert(pos, child);
        self.nodes[child_index].parent = Some(parent);
        Ok(())
    }

    /// Unlink `key` from its parent. Returns the former parent.
    fn detach(&mut self, key: PatchKey) -> Result<Option<PatchKey>, DomPatchError> {
        let index = self.index(key)?;
        let parent = self.nodes[index].parent.take();
        if let Some(parent) = parent
            && let Some(&parent_index) = self.live.get(&parent)
        {
            self.nodes[parent_index].children.retain(|k| *k != key);
        }
        Ok(parent)
    }

    /// Link a freshly created internal node; both keys are known live.
    fn link_last(&mut self, parent: PatchKey, child: PatchKey) {
        if let (Some(&p), Some(&c)) = (self.live.get(&parent), self.live.get(&child)) {
            self.nodes[p].children.push(child);
            self.nodes[c].parent = Some(parent);
        }
    }

    /// Replace `old` in `parent`'s children with `new_children`, detaching `old`.
    /// `old` keeps its slot and key; see `TreeMutation::replace_text_with`.
    fn splice_child(&mut self, parent: PatchKey, old: PatchKey, new_children: &[PatchKey]) {
        let Some(&parent_index) = self.live.get(&parent) else {
            return;
        };
        let siblings = &mut self.nodes[parent_index].children;
        let Some(pos) = siblings.iter().position(|k| *k == old) else {
            return;
        };
        siblings.splice(pos..=pos, new_children.iter().copied());
        for child in new_children {
            if let Some(&c) = self.live.get(child) {
                self.nodes[c].parent = Some(parent);
            }
        }
        if let Some(&old_index) = self.live.get(&old) {
            self.nodes[old_index].parent = None;
        }
    }

    fn set_attributes(
        &mut self,
        key: PatchKey,
        attributes: &[(Arc<str>, Option<String>)],
    ) -> Result<(), DomPatchError> {
        let index = self.index(key)?;
        match &mut self.nodes[index].kind {
            NodeKind::Element {
                attributes: attrs, ..
            } => {
                attrs.clear();
                attrs.extend(attributes.iter().cloned());
                Ok(())
            }
            _ => Err(DomPatchError::WrongNodeKind(key)),
        }
    }

    fn set_text(&mut self, key: PatchKey, text: &str) -> Result<(), DomPatchError> {
        let index = self.index(key)?;
        match &mut self.nodes[index].kind {
            NodeKind::Text { text: existing } => {
                existing.clear();
                existing.push_str(text);
                Ok(())
            }
            _ => Err(DomPatchError::WrongNodeKind(key)),
        }
    }

    fn style_mut(&mut self, key: PatchKey) -> Result<&mut Vec<(String, String)>, DomError> {
        let index = *self.live.get(&key).ok_or(DomError::MissingKey(key))?;
        match &mut self.nodes[index].kind {
            NodeKind::Element { style, .. } => Ok(style),
            _ => Err(DomError::WrongNodeKind(key)),
        }
    }

    fn is_descendant(&self, ancestor: PatchKey, maybe_descendant: PatchKey) -> bool {
        let Some(&index) = self.live.get(&ancestor) else {
            return false;
        };
        let mut stack = Vec::new();
        stack.extend(self.nodes[index].children.iter().copied());
        while let Some(current) = stack.pop() {
            if current == maybe_descendant {
                return true;
            }
            if let Some(&child_index) = self.live.get(&current) {
                stack.extend(self.nodes[child_index].children.iter().copied());
            }
        }
        false
    }

    fn materialize(&self, root: PatchKey) -> Result<Node, DomPatchError> {
        let index = self.index(root)?;
        self.materialize_node(index, root)
    }

    fn materialize_node(&self, index: usize, key: PatchKey) -> Result<Node, DomPatchError> {
        let id = key.id();
        let children = self.nodes[index]
            .children
            .iter()
            .map(|child_key| {
                let child_index = self.index(*child_key)?;
                self.materialize_node(child_index, *child_key)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let node = match &self.nodes[index].kind {
            NodeKind::Document { doctype } => Node::Document {
                id,
                doctype: doctype.clone(),
                children,
            },
            NodeKind::Element {
                name,
                attributes,
                style,
            } => Node::Element {
                id,
                name: Arc::clone(name),
                attributes: attributes.clone(),
                style: style.clone(),
                children,
            },
            NodeKind::Text { text } => Node::Text {
                id,
                text: text.clone(),
            },
            NodeKind::Comment { text } => Node::Comment {
                id,
                text: text.clone(),
            },
        };
        Ok(node)
    }
}

struct NodeRecord {
    kind: NodeKind,
    parent: Option<PatchKey>,
    children: Vec<PatchKey>,
}

impl NodeRecord {
    fn allows_children(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Document { .. } | NodeKind::Element { .. }
        )
    }
}

enum NodeKind {
    Document {
        doctype: Option<String>,
    },
    Element {
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
        style: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl NodeKind {
    fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document { .. } => NodeType::Document,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text { .. } => NodeType::Text,
            NodeKind::Comment { .. } => NodeType::Comment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DomTree;
    use crate::capability::{Fragment, TreeCapability, TreeMutation};
    use crate::dom_patch::{DomPatch, PatchKey};
    use crate::error::{DomError, DomPatchError};
    use std::sync::Arc;

    fn element(key: u32, name: &str, class: Option<&str>) -> DomPatch {
        DomPatch::CreateElement {
            key: PatchKey(key),
            name: Arc::from(name),
            attributes: class
                .map(|c| vec![(Arc::from("class"), Some(c.to_string()))])
                .unwrap_or_default(),
        }
    }

    fn text(key: u32, text: &str) -> DomPatch {
        DomPatch::CreateText {
            key: PatchKey(key),
            text: text.to_string(),
        }
    }

    fn append(parent: u32, child: u32) -> DomPatch {
        DomPatch::AppendChild {
            parent: PatchKey(parent),
            child: PatchKey(child),
        }
    }

    fn page() -> DomTree {
        let mut tree = DomTree::new();
        tree.apply(&[
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: None,
            },
            element(2, "div", Some("row")),
            append(1, 2),
            text(3, "Workflow: "),
            append(2, 3),
            element(4, "span", Some("field-value")),
            append(2, 4),
            text(5, "foo"),
            append(4, 5),
        ])
        .unwrap();
        tree
    }

    #[test]
    fn apply_builds_tree_and_records_insertions() {
        let mut tree = page();
        assert_eq!(tree.root(), Some(PatchKey(1)));
        assert_eq!(tree.children(PatchKey(2)), [PatchKey(3), PatchKey(4)]);
        assert_eq!(tree.direct_text(PatchKey(2)), ["Workflow: "]);
        assert_eq!(tree.text_content(PatchKey(2)), "Workflow: foo");

        let records = tree.take_records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].target, PatchKey(1));
        assert_eq!(records[0].added, [PatchKey(2)]);
        assert!(tree.take_records().is_empty());
    }

    #[test]
    fn duplicate_and_reserved_keys_are_rejected() {
        let mut tree = page();
        assert_eq!(
            tree.apply(&[element(2, "p", None)]),
            Err(DomPatchError::DuplicateKey(PatchKey(2)))
        );
        assert_eq!(
            tree.apply(&[element(0, "p", None)]),
            Err(DomPatchError::InvalidKey(PatchKey(0)))
        );
        assert_eq!(
            tree.apply(&[element(9, "p", None), DomPatch::Clear]),
            Err(DomPatchError::MidStreamClear)
        );
    }

    #[test]
    fn cycles_and_double_parents_are_rejected() {
        let mut tree = page();
        assert_eq!(
            tree.apply(&[append(4, 2)]),
            Err(DomPatchError::CycleDetected {
                parent: PatchKey(4),
                child: PatchKey(2)
            })
        );
        assert_eq!(
            tree.apply(&[append(1, 4)]),
            Err(DomPatchError::InvalidParent(PatchKey(4)))
        );
    }

    #[test]
    fn removed_subtree_is_detached_but_keeps_identity() {
        let mut tree = page();
        tree.take_records();
        tree.apply(&[DomPatch::RemoveNode { key: PatchKey(2) }])
            .unwrap();
        assert!(tree.contains(PatchKey(4)));
        assert!(!tree.is_attached(PatchKey(4)));
        assert_eq!(
            tree.set_style(PatchKey(2), "background", "red"),
            Err(DomError::Detached(PatchKey(2)))
        );
        let records = tree.take_records();
        assert_eq!(records[0].removed, [PatchKey(2)]);

        tree.apply(&[append(1, 2)]).unwrap();
        assert!(tree.is_attached(PatchKey(4)));
    }

    #[test]
    fn set_style_overwrites_existing_property() {
        let mut tree = page();
        tree.set_style(PatchKey(2), "background", "#fff").unwrap();
        tree.set_style(PatchKey(2), "padding", "2px").unwrap();
        tree.set_style(PatchKey(2), "background", "#000").unwrap();
        assert_eq!(
            tree.style(PatchKey(2)),
            [
                ("background".to_string(), "#000".to_string()),
                ("padding".to_string(), "2px".to_string())
            ]
        );
        assert_eq!(tree.remove_style(PatchKey(2), "padding"), Ok(true));
        assert_eq!(tree.remove_style(PatchKey(2), "padding"), Ok(false));
        assert_eq!(
            tree.set_style(PatchKey(3), "color", "red"),
            Err(DomError::WrongNodeKind(PatchKey(3)))
        );
    }

    #[test]
    fn replace_text_splices_fragments_in_place() {
        let mut tree = page();
        tree.take_records();
        let added = tree
            .replace_text_with(
                PatchKey(5),
                vec![
                    Fragment::Text("f".into()),
                    Fragment::Element {
                        name: Arc::from("b"),
                        attributes: Vec::new(),
                        style: Vec::new(),
                        children: vec![Fragment::Text("oo".into())],
                    },
                ],
            )
            .unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|k| k.0 > 1_000_000));
        assert_eq!(tree.children(PatchKey(4)), added.as_slice());
        assert_eq!(tree.text_content(PatchKey(4)), "foo");
        assert!(!tree.is_attached(PatchKey(5)));
        // The replaced node is orphaned, not freed.
        assert!(tree.contains(PatchKey(5)));
        assert_eq!(tree.parent(PatchKey(5)), None);
        assert_eq!(tree.text(PatchKey(5)), Some("foo"));
        assert_eq!(
            tree.apply(&[text(5, "again")]),
            Err(DomPatchError::DuplicateKey(PatchKey(5)))
        );

        let records = tree.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, PatchKey(4));
        assert_eq!(records[0].removed, [PatchKey(5)]);
    }

    #[test]
    fn clear_keeps_keys_reserved() {
        let mut tree = page();
        tree.apply(&[DomPatch::Clear]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(
            tree.apply(&[element(2, "div", None)]),
            Err(DomPatchError::DuplicateKey(PatchKey(2)))
        );
    }
}
