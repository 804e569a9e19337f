use crate::config::AnnotatorConfig;
use crate::store::AnnotationStore;
use dom::text::{contains_ignore_ascii_case, match_ranges_ignore_ascii_case};
use dom::{DomError, Fragment, NodeType, PatchKey, TreeMutation};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// The node had already been handled; nothing was touched.
    AlreadySeen,
    /// Keyword absent (or only split across separate text nodes).
    Unchanged,
    Highlighted { occurrences: usize },
}

/// Wraps every occurrence of a keyword in an emphasis element, once per node.
#[derive(Clone, Debug)]
pub struct KeywordAnnotator {
    keyword: String,
    emphasis_tag: Arc<str>,
    emphasis_style: Vec<(String, String)>,
}

impl KeywordAnnotator {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            keyword: config.keyword.clone(),
            emphasis_tag: Arc::from(config.emphasis_tag.as_str()),
            emphasis_style: config
                .emphasis_style
                .iter()
                .map(|d| (d.property.clone(), d.value.clone()))
                .collect(),
        }
    }

    /// Annotate `key` unless the store says it was already handled.
    ///
    /// The node is marked seen whether or not the keyword occurs. A detached
    /// node is left alone and stays unseen, so it is picked up again if the
    /// host re-inserts it.
    pub fn annotate<T: TreeMutation>(
        &self,
        tree: &mut T,
        store: &mut AnnotationStore,
        key: PatchKey,
    ) -> Result<AnnotationOutcome, DomError> {
        if store.is_seen(key) {
            return Ok(AnnotationOutcome::AlreadySeen);
        }
        if !tree.contains(key) {
            return Err(DomError::MissingKey(key));
        }
        if !tree.is_attached(key) {
            return Err(DomError::Detached(key));
        }

        let mut occurrences = 0;
        if contains_ignore_ascii_case(&tree.text_content(key), &self.keyword) {
            let candidates = if tree.node_type(key) == Some(NodeType::Text) {
                vec![key]
            } else {
                tree.descendants(key)
            };
            // Text already wrapped by an earlier pass (e.g. through an
            // enclosing block) is left alone.
            let text_nodes: Vec<PatchKey> = candidates
                .into_iter()
                .filter(|d| tree.node_type(*d) == Some(NodeType::Text))
                .filter(|d| !store.inside_emphasis(&*tree, *d))
                .collect();
            for text_key in text_nodes {
                occurrences += self.wrap_occurrences(tree, store, text_key)?;
            }
        }
        store.mark_seen(key);

        if occurrences == 0 {
            log::trace!(target: "review.annotator", "{key}: no {:?}", self.keyword);
            Ok(AnnotationOutcome::Unchanged)
        } else {
            log::trace!(target: "review.annotator", "{key}: wrapped {occurrences} occurrences");
            Ok(AnnotationOutcome::Highlighted { occurrences })
        }
    }

    fn wrap_occurrences<T: TreeMutation>(
        &self,
        tree: &mut T,
        store: &mut AnnotationStore,
        text_key: PatchKey,
    ) -> Result<usize, DomError> {
        let Some(text) = tree.text(text_key) else {
            return Ok(0);
        };
        let ranges = match_ranges_ignore_ascii_case(text, &self.keyword);
        if ranges.is_empty() {
            return Ok(0);
        }
        let mut fragments = Vec::with_capacity(ranges.len() * 2 + 1);
        let mut is_emphasis = Vec::with_capacity(ranges.len() * 2 + 1);
        let mut last = 0;
        for range in &ranges {
            if range.start > last {
                fragments.push(Fragment::Text(text[last..range.start].to_string()));
                is_emphasis.push(false);
            }
            is_emphasis.push(true);
            fragments.push(Fragment::Element {
                name: Arc::clone(&self.emphasis_tag),
                attributes: Vec::new(),
                style: self.emphasis_style.clone(),
                children: vec![Fragment::Text(text[range.clone()].to_string())],
            });
            last = range.end;
        }
        if last < text.len() {
            fragments.push(Fragment::Text(text[last..].to_string()));
            is_emphasis.push(false);
        }
        let added = tree.replace_text_with(text_key, fragments)?;
        for (node, _) in added.into_iter().zip(is_emphasis).filter(|(_, e)| *e) {
            store.mark_emphasis(node);
        }
        Ok(ranges.len())
    }
}
