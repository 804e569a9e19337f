//! Fixture helpers shared by the workspace's integration tests.

use dom::snapshot::{DomSnapshot, DomSnapshotOptions};
use dom::{DomPatch, DomTree, Node, PatchKey};
use std::sync::Arc;

/// Builds host patch batches with sequential keys.
///
/// Every `element`/`text` call appends to the pending batch; `take_batch`
/// hands the batch over so tests can control exactly which mutations land in
/// which delivery.
pub struct PageBuilder {
    next_key: u32,
    root: PatchKey,
    pending: Vec<DomPatch>,
}

impl PageBuilder {
    /// Starts a batch with a document root (key 1).
    pub fn new() -> Self {
        let root = PatchKey(1);
        Self {
            next_key: 2,
            root,
            pending: vec![DomPatch::CreateDocument {
                key: root,
                doctype: Some("html".to_string()),
            }],
        }
    }

    pub fn root(&self) -> PatchKey {
        self.root
    }

    fn alloc(&mut self) -> PatchKey {
        let key = PatchKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Create an element that is not linked anywhere yet.
    pub fn detached_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> PatchKey {
        let key = self.alloc();
        self.pending.push(DomPatch::CreateElement {
            key,
            name: Arc::from(name),
            attributes: attributes
                .iter()
                .map(|(k, v)| (Arc::from(*k), Some(v.to_string())))
                .collect(),
        });
        key
    }

    pub fn detached_text(&mut self, text: &str) -> PatchKey {
        let key = self.alloc();
        self.pending.push(DomPatch::CreateText {
            key,
            text: text.to_string(),
        });
        key
    }

    pub fn element(&mut self, parent: PatchKey, name: &str, attributes: &[(&str, &str)]) -> PatchKey {
        let key = self.detached_element(name, attributes);
        self.append(parent, key);
        key
    }

    pub fn text(&mut self, parent: PatchKey, text: &str) -> PatchKey {
        let key = self.detached_text(text);
        self.append(parent, key);
        key
    }

    pub fn append(&mut self, parent: PatchKey, child: PatchKey) {
        self.pending.push(DomPatch::AppendChild { parent, child });
    }

    pub fn remove(&mut self, key: PatchKey) {
        self.pending.push(DomPatch::RemoveNode { key });
    }

    pub fn take_batch(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.pending)
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot lines of a live subtree, ids ignored.
pub fn snapshot_lines(tree: &DomTree, key: PatchKey) -> Vec<String> {
    let node: Node = tree
        .materialize(key)
        .unwrap_or_else(|err| panic!("materialize {key}: {err}"));
    DomSnapshot::new(&node, DomSnapshotOptions::default())
        .as_lines()
        .to_vec()
}

/// Assert two line renderings are equal, printing a focused diff otherwise.
pub fn assert_lines_eq(expected: &[&str], actual: &[String]) {
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    if expected != actual {
        panic!("snapshot mismatch\n{}", diff_lines(&expected, actual));
    }
}

pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    use std::fmt::Write;
    let max = expected.len().max(actual.len());
    let missing = "<missing>";
    let mut out = String::new();
    let mismatch = (0..max).find(|&i| expected.get(i) != actual.get(i));
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let left = expected
                .get(line_idx)
                .map(String::as_str)
                .unwrap_or(missing);
            let right = actual.get(line_idx).map(String::as_str).unwrap_or(missing);
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {left}", line_idx + 1);
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {right}", line_idx + 1);
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}
