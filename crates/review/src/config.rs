//! Review configuration.
//!
//! Defaults reproduce the markup of the reviewed conversation page; a TOML
//! file only needs the keys it wants to change.
//!
//! ```toml
//! [annotator]
//! keyword = "refund"
//!
//! [[presets]]
//! name = "static-help"
//! checks = [{ label = "Intent:", expected = "ab_features_static_help" }]
//! ```

use dom::ElementMatcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewConfig {
    pub scanner: ScannerConfig,
    pub styles: ClassificationStyles,
    pub annotator: AnnotatorConfig,
    /// Replaces the built-in presets entirely when present.
    pub presets: Vec<Preset>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            styles: ClassificationStyles::default(),
            annotator: AnnotatorConfig::default(),
            presets: default_presets(),
        }
    }
}

impl ReviewConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ReviewConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::debug!(target: "review.config", "loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.annotator.keyword.trim().is_empty() {
            return Err(ConfigError::Invalid("annotator.keyword must not be empty".into()));
        }
        if self.annotator.emphasis_tag.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "annotator.emphasis_tag must not be empty".into(),
            ));
        }
        let block = &self.annotator.block;
        if block.classes().is_empty()
            && block
                .tag()
                .is_some_and(|t| t.eq_ignore_ascii_case(self.annotator.emphasis_tag.trim()))
        {
            return Err(ConfigError::Invalid(
                "annotator.emphasis_tag would itself match annotator.block".into(),
            ));
        }
        if self.scanner.max_element_children == 0 {
            return Err(ConfigError::Invalid(
                "scanner.max_element_children must be at least 1".into(),
            ));
        }
        if self.scanner.system_class.split_ascii_whitespace().count() > 1 {
            return Err(ConfigError::Invalid(
                "scanner.system_class must be a single class name".into(),
            ));
        }
        for preset in &self.presets {
            if preset.name.trim().is_empty() {
                return Err(ConfigError::Invalid("preset names must not be empty".into()));
            }
            if self.presets.iter().filter(|p| p.name == preset.name).count() > 1 {
                return Err(ConfigError::Invalid(format!(
                    "duplicate preset {:?}",
                    preset.name
                )));
            }
        }
        Ok(())
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Element kind that can act as a label/value container.
    pub container: ElementMatcher,
    /// Descendant that carries the comparable value.
    pub value_holder: ElementMatcher,
    /// Class marking system-authored content; such containers never qualify.
    pub system_class: String,
    pub max_element_children: usize,
    /// Trailing separator stripped from label prefixes before comparison.
    pub label_separator: char,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            container: ElementMatcher::new(Some("div"), &[]),
            value_holder: ElementMatcher::new(Some("span"), &["V6_4-field-value"]),
            system_class: "V6_4-system-content".to_string(),
            max_element_children: 2,
            label_separator: ':',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDecl {
    pub property: String,
    pub value: String,
}

impl StyleDecl {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationStyles {
    pub matched: Vec<StyleDecl>,
    pub mismatched: Vec<StyleDecl>,
}

impl Default for ClassificationStyles {
    fn default() -> Self {
        Self {
            matched: vec![
                StyleDecl::new("background", "#d8f3dc"),
                StyleDecl::new("border", "1px solid #2d6a4f"),
                StyleDecl::new("padding", "2px 4px"),
                StyleDecl::new("border-radius", "4px"),
            ],
            mismatched: vec![
                StyleDecl::new("background", "#f8d7da"),
                StyleDecl::new("border", "1px solid #721c24"),
                StyleDecl::new("padding", "2px 4px"),
                StyleDecl::new("border-radius", "4px"),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    pub keyword: String,
    /// Short textual block that gets annotated.
    pub block: ElementMatcher,
    /// Ancestor marking content authored by the automated counterpart.
    pub message: ElementMatcher,
    pub emphasis_tag: String,
    pub emphasis_style: Vec<StyleDecl>,
    /// Also visit qualifying blocks nested inside an inserted subtree, not
    /// only inserted nodes that are blocks themselves.
    pub descend_into_insertions: bool,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            keyword: "search".to_string(),
            block: ElementMatcher::new(Some("p"), &[]),
            message: ElementMatcher::new(Some("div"), &["V6_4-message", "V6_4-bot-message"]),
            emphasis_tag: "span".to_string(),
            emphasis_style: vec![
                StyleDecl::new("color", "red"),
                StyleDecl::new("font-weight", "bold"),
            ],
            descend_into_insertions: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelCheck {
    pub label: String,
    pub expected: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub name: String,
    pub checks: Vec<LabelCheck>,
}

pub fn default_presets() -> Vec<Preset> {
    vec![Preset {
        name: "accurate-using-kb".to_string(),
        checks: vec![
            LabelCheck {
                label: "Workflow:".to_string(),
                expected: "abfeature_concise_response_using_knowledge_base".to_string(),
            },
            LabelCheck {
                label: "Intent:".to_string(),
                expected: "ab_features_static_help".to_string(),
            },
        ],
    }]
}
