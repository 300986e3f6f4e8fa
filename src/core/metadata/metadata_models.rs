// Metadata domain models - the key/value block embedded in submitted code.
//
// Keys are an open set: anything written as `@key` is kept, and the handful
// of keys the rest of the pipeline cares about get typed accessors on top.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which comment grammar the submitted code uses for its metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    /// A userscript: `// ==UserScript==` single-line comments.
    #[default]
    Js,
    /// A userstyle: one `/* ==UserStyle== ... */` comment.
    Css,
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLanguage::Js => write!(f, "js"),
            ScriptLanguage::Css => write!(f, "css"),
        }
    }
}

impl FromStr for ScriptLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "js" | "javascript" => Ok(ScriptLanguage::Js),
            "css" => Ok(ScriptLanguage::Css),
            other => Err(format!("Unknown script language: {}", other)),
        }
    }
}

/// A parsed metadata block.
///
/// Every occurrence of a key is kept in source order, so multi-valued keys
/// such as `@match` or `@include` keep all of their values. A block can only
/// be built with a non-empty `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBlock {
    entries: BTreeMap<String, Vec<String>>,
}

impl MetadataBlock {
    /// Build a block from `(key, value)` pairs in source order.
    ///
    /// Keys are lower-cased. Returns `None` unless some `name` value is non-empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            entries
                .entry(key.as_ref().to_lowercase())
                .or_default()
                .push(value.into());
        }

        let block = Self { entries };
        (!block.name().is_empty()).then_some(block)
    }

    /// First value recorded for `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Every value recorded for `key`, in source order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First non-empty `@name`. An empty `@name` line does not hide a later one.
    pub fn name(&self) -> &str {
        self.get_all("name")
            .iter()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.non_empty("description")
    }

    pub fn version(&self) -> Option<&str> {
        self.non_empty("version")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.non_empty("namespace")
    }

    pub fn license(&self) -> Option<&str> {
        self.non_empty("license")
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }
}
