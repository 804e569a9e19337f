//! Tree capability traits.
//!
//! These traits are the only view of the document that matching and
//! annotation code gets. `DomTree` implements both; alternative trees (or
//! test doubles) only need the handful of required methods, everything else
//! is derived.
//!
//! # Design Principles
//!
//! - Nodes are addressed by `PatchKey`; reads on unknown keys degrade to
//!   "nothing there" (empty slices, `None`, `false`) instead of failing.
//! - Writes are fallible and refuse to touch nodes that are not attached to
//!   the document, so a stale key from an old mutation batch cannot resurrect
//!   content the host already removed.

use crate::dom_patch::PatchKey;
use crate::error::DomError;
use crate::types::NodeType;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub trait TreeCapability {
    // =========================================================================
    // Required
    // =========================================================================

    /// Document root, if the tree has one.
    fn root(&self) -> Option<PatchKey>;

    fn node_type(&self, key: PatchKey) -> Option<NodeType>;

    fn parent(&self, key: PatchKey) -> Option<PatchKey>;

    /// Ordered children; empty for leaves and unknown keys.
    fn children(&self, key: PatchKey) -> &[PatchKey];

    /// Element name, `None` for non-elements.
    fn tag_name(&self, key: PatchKey) -> Option<&str>;

    fn attributes(&self, key: PatchKey) -> &[(Arc<str>, Option<String>)];

    /// Text of a text node, `None` for everything else.
    fn text(&self, key: PatchKey) -> Option<&str>;

    /// Presentation style entries of an element, in application order.
    fn style(&self, key: PatchKey) -> &[(String, String)];

    // =========================================================================
    // Derived
    // =========================================================================

    fn contains(&self, key: PatchKey) -> bool {
        self.node_type(key).is_some()
    }

    fn is_element(&self, key: PatchKey) -> bool {
        self.node_type(key) == Some(NodeType::Element)
    }

    /// True when walking parents from `key` reaches the document root.
    fn is_attached(&self, key: PatchKey) -> bool {
        let Some(root) = self.root() else {
            return false;
        };
        let mut current = Some(key);
        while let Some(k) = current {
            if k == root {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    /// True when `ancestor == key` or `ancestor` is one of `key`'s ancestors.
    fn is_inclusive_ancestor(&self, ancestor: PatchKey, key: PatchKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    fn attr(&self, key: PatchKey, name: &str) -> Option<&str> {
        self.attributes(key)
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    fn has_class(&self, key: PatchKey, class: &str) -> bool {
        self.attr(key, "class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }

    fn element_children(&self, key: PatchKey) -> Vec<PatchKey> {
        self.children(key)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Text segments owned directly by `key`: its text-node children only,
    /// nothing from deeper descendants.
    fn direct_text(&self, key: PatchKey) -> Vec<&str> {
        self.children(key)
            .iter()
            .filter_map(|c| self.text(*c))
            .collect()
    }

    /// Concatenated text of every descendant text node, in document order.
    fn text_content(&self, key: PatchKey) -> String {
        let mut out = String::new();
        if let Some(text) = self.text(key) {
            out.push_str(text);
            return out;
        }
        for d in self.descendants(key) {
            if let Some(text) = self.text(d) {
                out.push_str(text);
            }
        }
        out
    }

    /// Pre-order descendants of `key`, excluding `key` itself.
    fn descendants(&self, key: PatchKey) -> Vec<PatchKey> {
        let mut out = Vec::new();
        let mut stack: Vec<PatchKey> = self.children(key).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// First descendant of `key` (pre-order) satisfying `predicate`.
    fn find<F>(&self, key: PatchKey, mut predicate: F) -> Option<PatchKey>
    where
        F: FnMut(&Self, PatchKey) -> bool,
        Self: Sized,
    {
        self.descendants(key)
            .into_iter()
            .find(|d| predicate(self, *d))
    }

    fn find_all<F>(&self, key: PatchKey, mut predicate: F) -> Vec<PatchKey>
    where
        F: FnMut(&Self, PatchKey) -> bool,
        Self: Sized,
    {
        self.descendants(key)
            .into_iter()
            .filter(|d| predicate(self, *d))
            .collect()
    }

    /// Nearest strict ancestor of `key` satisfying `predicate`.
    fn closest_ancestor<F>(&self, key: PatchKey, mut predicate: F) -> Option<PatchKey>
    where
        F: FnMut(&Self, PatchKey) -> bool,
        Self: Sized,
    {
        let mut current = self.parent(key);
        while let Some(k) = current {
            if predicate(self, k) {
                return Some(k);
            }
            current = self.parent(k);
        }
        None
    }

    fn matches(&self, key: PatchKey, matcher: &ElementMatcher) -> bool {
        let Some(name) = self.tag_name(key) else {
            return false;
        };
        if let Some(tag) = matcher.tag()
            && !name.eq_ignore_ascii_case(tag)
        {
            return false;
        }
        matcher.classes().iter().all(|c| self.has_class(key, c))
    }
}

pub trait TreeMutation: TreeCapability {
    /// Set one presentation style property; an existing entry for the same
    /// property is overwritten in place.
    fn set_style(&mut self, key: PatchKey, property: &str, value: &str) -> Result<(), DomError>;

    /// Drop a style property. Returns whether an entry was present.
    fn remove_style(&mut self, key: PatchKey, property: &str) -> Result<bool, DomError>;

    /// Replace a text node with a sequence of freshly created nodes, at the
    /// text node's position. Returns the keys of the new top-level nodes, in
    /// fragment order.
    ///
    /// The replaced text node is detached, not freed: it stays in the arena
    /// with its key reserved (like `DomPatch::RemoveNode`), so `contains`
    /// still reports it and the host may re-append it. Repeated replacement
    /// therefore grows the arena until the next `DomPatch::Clear`.
    fn replace_text_with(
        &mut self,
        key: PatchKey,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<PatchKey>, DomError>;
}

/// Content to be materialized into the tree by `TreeMutation::replace_text_with`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Element {
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
        style: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
}

/// Tag + class predicate, written as a compound selector: `div`,
/// `span.field-value`, `.message.bot` (any tag).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ElementMatcher {
    tag: Option<String>,
    classes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid element selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: &'static str,
}

impl ElementMatcher {
    /// `tag: None` matches any element name.
    pub fn new(tag: Option<&str>, classes: &[&str]) -> Self {
        Self {
            tag: tag.map(|t| t.to_ascii_lowercase()),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let err = |reason| SelectorError {
            selector: selector.to_string(),
            reason,
        };
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(err("empty selector"));
        }
        if trimmed.contains(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~' | '#' | '[')) {
            return Err(err("only tag and class parts are supported"));
        }
        let mut parts = trimmed.split('.');
        let tag = match parts.next() {
            Some("") | Some("*") | None => None,
            Some(t) => Some(t.to_ascii_lowercase()),
        };
        let mut classes = Vec::new();
        for class in parts {
            if class.is_empty() {
                return Err(err("empty class name"));
            }
            classes.push(class.to_string());
        }
        if tag.is_none() && classes.is_empty() {
            return Err(err("selector matches every element"));
        }
        Ok(Self { tag, classes })
    }
}

impl FromStr for ElementMatcher {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ElementMatcher {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ElementMatcher> for String {
    fn from(value: ElementMatcher) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ElementMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => f.write_str(tag)?,
            None if self.classes.is_empty() => f.write_str("*")?,
            None => {}
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}
