//! Review-page helpers over a live `dom` tree.
//!
//! Two independent paths share this crate:
//!
//! - **Field verification** (`verify_field`, `run_preset`): on demand, find
//!   containers labelled with a given prefix and paint them by whether their
//!   value equals the expected one.
//! - **Keyword annotation** (`start_annotation_service`): continuously wrap a
//!   keyword in emphasis inside qualifying blocks, at most once per node.

pub mod annotator;
pub mod config;
pub mod scanner;
pub mod service;
pub mod store;
pub mod verifier;
pub mod watcher;

pub use crate::annotator::{AnnotationOutcome, KeywordAnnotator};
pub use crate::config::{ConfigError, LabelCheck, Preset, ReviewConfig};
pub use crate::scanner::{LabelValuePair, TreeScanner};
pub use crate::service::{AnnotationService, ServiceError, start_annotation_service};
pub use crate::store::{AnnotationStore, SharedAnnotationStore};
pub use crate::verifier::{Classification, FieldVerifier};
pub use crate::watcher::{BatchStats, MutationWatcher};

use dom::{PatchKey, TreeMutation};

/// Verdict for one container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldOutcome {
    pub label: String,
    pub container: PatchKey,
    /// Trimmed text of the value holder at verification time.
    pub actual: String,
    pub expected: String,
    pub classification: Classification,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub outcomes: Vec<FieldOutcome>,
}

impl VerificationReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.count(Classification::Match)
    }

    pub fn mismatched(&self) -> usize {
        self.count(Classification::Mismatch)
    }

    /// True when at least one container was checked and none mismatched.
    pub fn all_matched(&self) -> bool {
        !self.is_empty() && self.mismatched() == 0
    }

    fn count(&self, classification: Classification) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.classification == classification)
            .count()
    }

    pub fn extend(&mut self, other: VerificationReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Classify and style every container labelled `label_prefix`.
///
/// Finding nothing is not an error: the report is simply empty. A container
/// the tree refuses to style is skipped.
pub fn verify_field<T: TreeMutation>(
    tree: &mut T,
    config: &ReviewConfig,
    label_prefix: &str,
    expected: &str,
) -> VerificationReport {
    let mut report = VerificationReport::default();
    let Some(root) = tree.root() else {
        log::debug!(target: "review.verifier", "no document; nothing to verify");
        return report;
    };
    let candidates = TreeScanner::new(&config.scanner).find_candidates(tree, root, label_prefix);
    let verifier = FieldVerifier::new(&config.styles);
    for pair in &candidates {
        let actual = tree.text_content(pair.holder).trim().to_string();
        match verifier.verify(tree, pair, expected) {
            Ok(classification) => report.outcomes.push(FieldOutcome {
                label: label_prefix.to_string(),
                container: pair.container,
                actual,
                expected: expected.to_string(),
                classification,
            }),
            Err(err) => {
                log::debug!(target: "review.verifier", "skipping {}: {err}", pair.container);
            }
        }
    }
    log::info!(
        target: "review.verifier",
        "{label_prefix} {} candidates, {} matched",
        candidates.len(),
        report.matched()
    );
    report
}

/// Run every check of a named preset. `None` when no such preset exists.
pub fn run_preset<T: TreeMutation>(
    tree: &mut T,
    config: &ReviewConfig,
    name: &str,
) -> Option<VerificationReport> {
    let preset = config.preset(name)?;
    let mut report = VerificationReport::default();
    for check in &preset.checks {
        report.extend(verify_field(tree, config, &check.label, &check.expected));
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::{ReviewConfig, VerificationReport, run_preset, verify_field};
    use dom::DomTree;

    #[test]
    fn empty_tree_yields_empty_report() {
        let mut tree = DomTree::new();
        let config = ReviewConfig::default();
        let report = verify_field(&mut tree, &config, "Workflow:", "x");
        assert_eq!(report, VerificationReport::default());
        assert!(!report.all_matched());
    }

    #[test]
    fn unknown_preset_is_none() {
        let mut tree = DomTree::new();
        assert!(run_preset(&mut tree, &ReviewConfig::default(), "nope").is_none());
        assert_eq!(
            run_preset(&mut tree, &ReviewConfig::default(), "accurate-using-kb"),
            Some(VerificationReport::default())
        );
    }
}
