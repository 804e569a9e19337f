use crate::annotator::{AnnotationOutcome, KeywordAnnotator};
use crate::config::AnnotatorConfig;
use crate::store::SharedAnnotationStore;
use dom::observer::added_nodes;
use dom::{ElementMatcher, MutationRecord, PatchKey, TreeCapability, TreeMutation};
use std::ops::AddAssign;
use std::rc::Rc;

/// Per-batch bookkeeping of the annotation path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Qualifying nodes handed to the annotator.
    pub visited: usize,
    pub highlighted: usize,
    pub occurrences: usize,
    pub unchanged: usize,
    pub already_seen: usize,
    pub failed: usize,
}

impl AddAssign for BatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.visited += rhs.visited;
        self.highlighted += rhs.highlighted;
        self.occurrences += rhs.occurrences;
        self.unchanged += rhs.unchanged;
        self.already_seen += rhs.already_seen;
        self.failed += rhs.failed;
    }
}

/// Decides which inserted nodes are annotation targets and feeds them to the
/// annotator, in the order the host reported them.
pub struct MutationWatcher {
    block: ElementMatcher,
    message: ElementMatcher,
    descend_into_insertions: bool,
    annotator: KeywordAnnotator,
    store: SharedAnnotationStore,
}

impl MutationWatcher {
    pub fn new(config: &AnnotatorConfig, store: SharedAnnotationStore) -> Self {
        Self {
            block: config.block.clone(),
            message: config.message.clone(),
            descend_into_insertions: config.descend_into_insertions,
            annotator: KeywordAnnotator::new(config),
            store,
        }
    }

    pub fn store(&self) -> SharedAnnotationStore {
        Rc::clone(&self.store)
    }

    /// A block element with a strict ancestor matching the message selector.
    pub fn qualifies<T: TreeCapability>(&self, tree: &T, key: PatchKey) -> bool {
        tree.matches(key, &self.block)
            && tree
                .closest_ancestor(key, |t, a| t.matches(a, &self.message))
                .is_some()
    }

    /// Visit every qualifying node currently under `root`, in document order.
    pub fn sweep<T: TreeMutation>(&self, tree: &mut T, root: PatchKey) -> BatchStats {
        let mut stats = BatchStats::default();
        let targets: Vec<PatchKey> = std::iter::once(root)
            .chain(tree.descendants(root))
            .filter(|k| self.qualifies(tree, *k))
            .collect();
        for key in targets {
            self.visit(tree, key, &mut stats);
        }
        log::debug!(
            target: "review.watcher",
            "initial sweep from {root}: {} nodes, {} highlighted",
            stats.visited,
            stats.highlighted
        );
        stats
    }

    /// Drain one delivered batch. Per-node failures are logged and skipped.
    pub fn handle_batch<T: TreeMutation>(&self, tree: &mut T, records: &[MutationRecord]) -> BatchStats {
        let mut stats = BatchStats::default();
        for added in added_nodes(records) {
            if self.qualifies(tree, added) {
                self.visit(tree, added, &mut stats);
            }
            if self.descend_into_insertions {
                let nested: Vec<PatchKey> = tree
                    .descendants(added)
                    .into_iter()
                    .filter(|k| self.qualifies(tree, *k))
                    .collect();
                for key in nested {
                    self.visit(tree, key, &mut stats);
                }
            }
        }
        if stats.visited > 0 {
            log::trace!(
                target: "review.watcher",
                "batch of {} records: {stats:?}",
                records.len()
            );
        }
        stats
    }

    fn visit<T: TreeMutation>(&self, tree: &mut T, key: PatchKey, stats: &mut BatchStats) {
        stats.visited += 1;
        let result = self
            .annotator
            .annotate(tree, &mut self.store.borrow_mut(), key);
        match result {
            Ok(AnnotationOutcome::Highlighted { occurrences }) => {
                stats.highlighted += 1;
                stats.occurrences += occurrences;
            }
            Ok(AnnotationOutcome::Unchanged) => stats.unchanged += 1,
            Ok(AnnotationOutcome::AlreadySeen) => stats.already_seen += 1,
            Err(err) => {
                stats.failed += 1;
                log::debug!(target: "review.watcher", "skipping {key}: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchStats, MutationWatcher};
    use crate::config::AnnotatorConfig;
    use crate::store::AnnotationStore;
    use dom::{DomPatch, DomTree, ElementMatcher, MutationRecord, PatchKey, TreeCapability};
    use std::sync::Arc;

    const MESSAGE: &str = "V6_4-message V6_4-bot-message";

    fn create(key: u32, name: &str, class: &str) -> DomPatch {
        DomPatch::CreateElement {
            key: PatchKey(key),
            name: Arc::from(name),
            attributes: if class.is_empty() {
                Vec::new()
            } else {
                vec![(Arc::from("class"), Some(class.to_string()))]
            },
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

    /// doc(1) > message div(2) > p(3) "search me"; user div(4) > p(5) "search too"
    fn chat() -> DomTree {
        let mut tree = DomTree::new();
        tree.apply(&[
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: None,
            },
            create(2, "div", MESSAGE),
            append(1, 2),
            create(3, "p", ""),
            append(2, 3),
            text(30, "search me"),
            append(3, 30),
            create(4, "div", "V6_4-message"),
            append(1, 4),
            create(5, "p", ""),
            append(4, 5),
            text(50, "search too"),
            append(5, 50),
        ])
        .unwrap();
        tree
    }

    #[test]
    fn qualification_needs_block_inside_bot_message() {
        let tree = chat();
        let watcher = MutationWatcher::new(&AnnotatorConfig::default(), AnnotationStore::shared());
        assert!(watcher.qualifies(&tree, PatchKey(3)));
        assert!(!watcher.qualifies(&tree, PatchKey(5)), "missing bot class");
        assert!(!watcher.qualifies(&tree, PatchKey(2)), "not a block");
        assert!(!watcher.qualifies(&tree, PatchKey(30)), "text node");
    }

    #[test]
    fn sweep_annotates_present_blocks_once() {
        let mut tree = chat();
        let store = AnnotationStore::shared();
        let watcher = MutationWatcher::new(&AnnotatorConfig::default(), store.clone());

        let first = watcher.sweep(&mut tree, PatchKey(1));
        assert_eq!(first.visited, 1);
        assert_eq!(first.occurrences, 1);
        assert!(store.borrow().is_seen(PatchKey(3)));
        assert!(!store.borrow().is_seen(PatchKey(5)));

        let second = watcher.sweep(&mut tree, PatchKey(1));
        assert_eq!(second.already_seen, 1);
        assert_eq!(second.highlighted, 0);
    }

    #[test]
    fn batch_errors_do_not_stop_later_nodes() {
        let mut tree = chat();
        tree.apply(&[
            create(6, "p", ""),
            text(60, "search"),
            append(6, 60),
            append(2, 6),
            create(10, "div", MESSAGE),
            append(1, 10),
            create(7, "p", ""),
            text(70, "search again"),
            append(7, 70),
            append(10, 7),
        ])
        .unwrap();
        // The whole first message goes away before the batch is handled.
        tree.apply(&[DomPatch::RemoveNode { key: PatchKey(2) }])
            .unwrap();
        tree.take_records();

        let store = AnnotationStore::shared();
        let watcher = MutationWatcher::new(&AnnotatorConfig::default(), store.clone());
        let records = vec![
            MutationRecord::inserted(PatchKey(2), vec![PatchKey(6)]),
            MutationRecord::inserted(PatchKey(10), vec![PatchKey(7)]),
        ];
        let stats = watcher.handle_batch(&mut tree, &records);
        assert_eq!(stats.visited, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.highlighted, 1);
        assert!(store.borrow().is_seen(PatchKey(7)));
        assert!(!store.borrow().is_seen(PatchKey(6)));
    }

    #[test]
    fn nested_blocks_need_descend_flag() {
        let build = || {
            let mut tree = chat();
            tree.apply(&[
                create(8, "section", ""),
                create(9, "p", ""),
                text(90, "search inside"),
                append(9, 90),
                append(8, 9),
                append(2, 8),
            ])
            .unwrap();
            tree
        };
        let records = vec![MutationRecord::inserted(PatchKey(2), vec![PatchKey(8)])];

        let mut tree = build();
        let watcher = MutationWatcher::new(&AnnotatorConfig::default(), AnnotationStore::shared());
        assert_eq!(watcher.handle_batch(&mut tree, &records), BatchStats::default());

        let mut tree = build();
        let config = AnnotatorConfig {
            descend_into_insertions: true,
            ..AnnotatorConfig::default()
        };
        let watcher = MutationWatcher::new(&config, AnnotationStore::shared());
        let stats = watcher.handle_batch(&mut tree, &records);
        assert_eq!(stats.highlighted, 1);
        assert_eq!(tree.text_content(PatchKey(9)), "search inside");
        assert_eq!(tree.children(PatchKey(9)).len(), 2);
    }

    /// Every span under `key`, and none of them nested in another.
    fn flat_spans(tree: &DomTree, key: PatchKey) -> usize {
        let spans: Vec<PatchKey> = tree
            .descendants(key)
            .into_iter()
            .filter(|k| tree.tag_name(*k) == Some("span"))
            .collect();
        for span in &spans {
            assert!(tree.element_children(*span).is_empty(), "span {span} wraps another element");
        }
        spans.len()
    }

    #[test]
    fn sweep_wraps_nested_paragraph_once() {
        let mut tree = chat();
        tree.apply(&[create(11, "p", ""), text(110, "search"), append(11, 110), append(3, 11)])
            .unwrap();
        let store = AnnotationStore::shared();
        let watcher = MutationWatcher::new(&AnnotatorConfig::default(), store.clone());

        let stats = watcher.sweep(&mut tree, PatchKey(1));
        assert_eq!(
            stats,
            BatchStats {
                visited: 2,
                highlighted: 1,
                occurrences: 2,
                unchanged: 1,
                ..BatchStats::default()
            }
        );
        assert!(store.borrow().is_seen(PatchKey(11)));
        assert_eq!(flat_spans(&tree, PatchKey(3)), 2);
        assert_eq!(tree.element_children(PatchKey(11)).len(), 1);
        assert_eq!(tree.text_content(PatchKey(3)), "search mesearch");
    }

    #[test]
    fn nested_list_items_are_wrapped_once_when_descending() {
        let mut tree = chat();
        tree.apply(&[
            create(12, "ul", ""),
            create(13, "li", ""),
            text(130, "search "),
            create(14, "li", ""),
            text(140, "search"),
            append(14, 140),
            append(13, 130),
            append(13, 14),
            append(12, 13),
            append(2, 12),
        ])
        .unwrap();
        let config = AnnotatorConfig {
            block: ElementMatcher::new(Some("li"), &[]),
            descend_into_insertions: true,
            ..AnnotatorConfig::default()
        };
        let watcher = MutationWatcher::new(&config, AnnotationStore::shared());
        let records = vec![MutationRecord::inserted(PatchKey(2), vec![PatchKey(12)])];

        let stats = watcher.handle_batch(&mut tree, &records);
        assert_eq!(stats.visited, 2);
        assert_eq!(stats.highlighted, 1);
        assert_eq!(stats.occurrences, 2);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(flat_spans(&tree, PatchKey(12)), 2);
        assert_eq!(tree.text_content(PatchKey(13)), "search search");
    }
}
