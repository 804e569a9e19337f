use crate::config::ScannerConfig;
use dom::{PatchKey, TreeCapability};

/// A container whose own text starts with a label, and the descendant that
/// carries its value. Only lives for one verification call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelValuePair<'l> {
    pub label_prefix: &'l str,
    pub holder: PatchKey,
    pub container: PatchKey,
}

pub struct TreeScanner<'a> {
    config: &'a ScannerConfig,
}

impl<'a> TreeScanner<'a> {
    pub fn new(config: &'a ScannerConfig) -> Self {
        Self { config }
    }

    /// Every container under `root` (document order) that qualifies for
    /// `label_prefix`. Empty when nothing qualifies.
    pub fn find_candidates<'l, T: TreeCapability>(
        &self,
        tree: &T,
        root: PatchKey,
        label_prefix: &'l str,
    ) -> Vec<LabelValuePair<'l>> {
        let wanted = strip_label_separator(label_prefix, self.config.label_separator);
        let mut out = Vec::new();
        for container in tree.descendants(root) {
            if let Some(holder) = self.qualify(tree, container, wanted) {
                log::trace!(
                    target: "review.scanner",
                    "container {container} qualifies for {wanted:?} (holder {holder})"
                );
                out.push(LabelValuePair {
                    label_prefix,
                    holder,
                    container,
                });
            }
        }
        out
    }

    fn qualify<T: TreeCapability>(&self, tree: &T, container: PatchKey, wanted: &str) -> Option<PatchKey> {
        if !tree.matches(container, &self.config.container) {
            return None;
        }
        if !self.config.system_class.is_empty() && tree.has_class(container, &self.config.system_class) {
            return None;
        }
        if tree.element_children(container).len() > self.config.max_element_children {
            return None;
        }
        if !direct_label_text(tree, container).starts_with(wanted) {
            return None;
        }
        let holders = tree.find_all(container, |t, k| t.matches(k, &self.config.value_holder));
        match holders.as_slice() {
            [holder] => Some(*holder),
            _ => None,
        }
    }
}

/// The container's own text segments, each trimmed, concatenated.
pub fn direct_label_text<T: TreeCapability>(tree: &T, container: PatchKey) -> String {
    tree.direct_text(container)
        .into_iter()
        .map(str::trim)
        .collect()
}

/// `"Workflow:"` → `"Workflow"`; only one trailing separator is removed.
pub fn strip_label_separator(label_prefix: &str, separator: char) -> &str {
    let trimmed = label_prefix.trim();
    trimmed
        .strip_suffix(separator)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}
