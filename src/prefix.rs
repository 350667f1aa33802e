//! Table-name token substitution.
//!
//! `{owner}` and `{qualifier}` are the core form. The doubled module form
//! `{{owner}}` and `{{qualifier}}` additionally carries the module qualifier.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::borrow::Cow;

lazy_static! {
    static ref PREFIX_TOKEN: Regex =
        Regex::new(r"\{\{(owner|qualifier)\}\}|\{(owner|qualifier)\}").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TablePrefixes {
    pub owner: String,
    pub qualifier: String,
    pub module_qualifier: String,
}

impl TablePrefixes {
    pub fn new(owner: &str, qualifier: &str, module_qualifier: &str) -> Self {
        Self {
            owner: owner.to_string(),
            qualifier: qualifier.to_string(),
            module_qualifier: module_qualifier.to_string(),
        }
    }
    fn owner_prefix(&self) -> String {
        if self.owner.is_empty() {
            String::new()
        } else {
            format!("{}.", self.owner)
        }
    }
    fn qualifier_prefix(&self, with_module: bool) -> String {
        let mut prefix = String::new();
        if !self.qualifier.is_empty() {
            prefix.push_str(&self.qualifier);
            prefix.push('_');
        }
        if with_module && !self.module_qualifier.is_empty() {
            prefix.push_str(&self.module_qualifier);
            prefix.push('_');
        }
        prefix
    }
    /// Replaces every token in one pass; replacement text is never rescanned.
    pub fn substitute<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains('{') {
            return Cow::Borrowed(text);
        }
        PREFIX_TOKEN.replace_all(text, |caps: &Captures| {
            let (token, module) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => (m.as_str(), true),
                (None, Some(m)) => (m.as_str(), false),
                (None, None) => return String::new(),
            };
            if token == "owner" {
                self.owner_prefix()
            } else {
                self.qualifier_prefix(module)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_and_module_forms() {
        let p = TablePrefixes::new("dbo", "crm", "sales");
        assert_eq!(
            p.substitute("SELECT * FROM {owner}{qualifier}Customer"),
            "SELECT * FROM dbo.crm_Customer"
        );
        assert_eq!(
            p.substitute("FROM {{owner}}{{qualifier}}Lead"),
            "FROM dbo.crm_sales_Lead"
        );
    }

    #[test]
    fn empty_prefixes_vanish() {
        let p = TablePrefixes::default();
        assert_eq!(p.substitute("{owner}{qualifier}T"), "T");
        assert!(matches!(p.substitute("no tokens"), Cow::Borrowed(_)));
    }

    #[test]
    fn replacement_is_not_rescanned() {
        let p = TablePrefixes::new("{owner}", "", "");
        assert_eq!(p.substitute("{owner}T"), "{owner}.T");
    }
}
