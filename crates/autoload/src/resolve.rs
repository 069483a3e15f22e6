//! Declared-name splitting and module identifier resolution.
//!
//! Resolution is a pure textual transformation and never fails: the
//! namespace separator becomes a path separator, remaining word separators
//! become underscores, and the artifact suffix is appended. Names are not
//! validated here; an unusable name fails later at import time.

use crate::AutoloadConfig;

/// Split a declaration value into declared names.
///
/// Every whitespace character is a separator and empty tokens are kept, so
/// `"a  b"` yields `["a", "", "b"]`. Empty names are loaded like any other.
pub fn declared_names(value: &str) -> Vec<&str> {
    value.split(char::is_whitespace).collect()
}

/// Map a declared name to the identifier requested from the importer.
pub fn module_identifier(name: &str, cfg: &AutoloadConfig) -> String {
    let namespaced = name.replace(&cfg.namespace_separator, &cfg.namespace_replacement);
    let mut ident = namespaced.replace(&cfg.word_separator, &cfg.word_replacement);
    ident.push_str(&cfg.suffix);
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> String {
        module_identifier(name, &AutoloadConfig::default())
    }

    #[test]
    fn dashes_become_underscores() {
        assert_eq!(resolve("user-list"), "user_list_controller");
    }

    #[test]
    fn double_dash_becomes_path() {
        assert_eq!(resolve("item--row"), "item/row_controller");
        assert_eq!(
            resolve("admin--user-list--row"),
            "admin/user_list/row_controller"
        );
    }

    #[test]
    fn triple_dash_splits_namespace_first() {
        assert_eq!(resolve("a---b"), "a/_b_controller");
    }

    #[test]
    fn resolution_is_deterministic() {
        for name in ["", "x", "a--b", "hello-world", "--", "a b"] {
            assert_eq!(resolve(name), resolve(name));
            assert!(!resolve(name).contains("--"));
        }
    }

    #[test]
    fn empty_name_still_resolves() {
        assert_eq!(resolve(""), "_controller");
    }

    #[test]
    fn names_split_on_any_whitespace_keeping_empties() {
        assert_eq!(declared_names("user-list item--row"), ["user-list", "item--row"]);
        assert_eq!(declared_names("a  b"), ["a", "", "b"]);
        assert_eq!(declared_names("a\tb"), ["a", "b"]);
        assert_eq!(declared_names(""), [""]);
    }
}
