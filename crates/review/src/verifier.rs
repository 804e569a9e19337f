use crate::config::{ClassificationStyles, StyleDecl};
use crate::scanner::LabelValuePair;
use dom::{DomError, PatchKey, TreeCapability, TreeMutation};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    Match,
    Mismatch,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Match => "match",
            Classification::Mismatch => "mismatch",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct FieldVerifier<'a> {
    styles: &'a ClassificationStyles,
}

impl<'a> FieldVerifier<'a> {
    pub fn new(styles: &'a ClassificationStyles) -> Self {
        Self { styles }
    }

    /// Exact, case-sensitive comparison of the holder's trimmed text.
    pub fn classify<T: TreeCapability>(tree: &T, holder: PatchKey, expected: &str) -> Classification {
        if tree.text_content(holder).trim() == expected {
            Classification::Match
        } else {
            Classification::Mismatch
        }
    }

    /// Classify `pair` and paint its container accordingly.
    ///
    /// Style properties that belong only to the other classification are
    /// removed first, so the container always shows exactly one verdict.
    pub fn verify<T: TreeMutation>(
        &self,
        tree: &mut T,
        pair: &LabelValuePair<'_>,
        expected: &str,
    ) -> Result<Classification, DomError> {
        let classification = Self::classify(tree, pair.holder, expected);
        let (apply, other) = match classification {
            Classification::Match => (&self.styles.matched, &self.styles.mismatched),
            Classification::Mismatch => (&self.styles.mismatched, &self.styles.matched),
        };
        for stale in other.iter().filter(|o| !declares(apply, &o.property)) {
            tree.remove_style(pair.container, &stale.property)?;
        }
        for decl in apply {
            tree.set_style(pair.container, &decl.property, &decl.value)?;
        }
        log::trace!(
            target: "review.verifier",
            "{} {classification} (expected {expected:?})",
            pair.container
        );
        Ok(classification)
    }
}

fn declares(decls: &[StyleDecl], property: &str) -> bool {
    decls.iter().any(|d| d.property.eq_ignore_ascii_case(property))
}
