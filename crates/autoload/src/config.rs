//! Loader configuration: the declaration attribute and the naming convention.

use std::{ffi::OsStr, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Attribute that declares behaviors on an element.
pub const DEFAULT_ATTRIBUTE: &str = "data-controller";
/// Suffix appended to every module identifier.
pub const DEFAULT_SUFFIX: &str = "_controller";

/// Naming and discovery settings for an [`Autoloader`](crate::Autoloader).
///
/// The defaults map `user-list` to `user_list_controller` and `item--row`
/// to `item/row_controller`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoloadConfig {
    /// Declaration attribute name.
    pub attribute: String,
    /// Suffix identifying the artifact kind.
    pub suffix: String,
    /// Token expressing nested namespacing in a declared name.
    pub namespace_separator: String,
    /// Replacement for `namespace_separator` in the identifier.
    pub namespace_replacement: String,
    /// Token expressing a word boundary in a declared name.
    pub word_separator: String,
    /// Replacement for `word_separator` in the identifier.
    pub word_replacement: String,
}

impl Default for AutoloadConfig {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_ATTRIBUTE.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            namespace_separator: "--".to_string(),
            namespace_replacement: "/".to_string(),
            word_separator: "-".to_string(),
            word_replacement: "_".to_string(),
        }
    }
}

impl AutoloadConfig {
    /// Parse a configuration from RON text and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let cfg: Self = ron::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a configuration from a `.ron` file at `path`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.extension() != Some(OsStr::new("ron")) {
            return Err(Error::Config(format!(
                "Unsupported config format at {} (expected a .ron file)",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Check that the attribute and separators are usable.
    pub fn validate(&self) -> Result<()> {
        if self.attribute.is_empty() {
            return Err(Error::Config("attribute must not be empty".into()));
        }
        if self
            .attribute
            .chars()
            .any(|c| c.is_whitespace() || c == '[' || c == ']')
        {
            return Err(Error::Config(format!(
                "attribute {:?} is not a valid attribute name",
                self.attribute
            )));
        }
        if self.namespace_separator.is_empty() {
            return Err(Error::Config("namespace_separator must not be empty".into()));
        }
        if self.word_separator.is_empty() {
            return Err(Error::Config("word_separator must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let cfg = AutoloadConfig::from_ron_str(r#"(attribute: "data-behavior")"#).unwrap();
        assert_eq!(cfg.attribute, "data-behavior");
        assert_eq!(cfg.suffix, DEFAULT_SUFFIX);
        assert_eq!(cfg.namespace_separator, "--");
    }

    #[test]
    fn empty_attribute_is_rejected() {
        let err = AutoloadConfig::from_ron_str(r#"(attribute: "")"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bracketed_attribute_is_rejected() {
        let cfg = AutoloadConfig {
            attribute: "[data-controller]".into(),
            ..AutoloadConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_ron_path_is_rejected() {
        let err = AutoloadConfig::load_from_path(Path::new("autoload.toml")).unwrap_err();
        assert!(err.to_string().contains("expected a .ron file"));
    }
}
