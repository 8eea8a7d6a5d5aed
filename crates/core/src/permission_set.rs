// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Full-string regex permission lists (`permitted_to_send` / `permitted_to_recv`).

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A list of regexes, each anchored to match the whole candidate string.
#[derive(Debug, Clone)]
pub struct PermissionSet {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl PermissionSet {
    pub fn new(patterns: Vec<String>) -> Result<Self, regex::Error> {
        let compiled =
            patterns.iter().map(|p| Regex::new(&format!("^(?:{p})$"))).collect::<Result<_, _>>()?;
        Ok(Self { patterns, compiled })
    }

    pub fn empty() -> Self {
        Self { patterns: Vec::new(), compiled: Vec::new() }
    }

    /// True if `candidate` fully matches at least one pattern in this set.
    pub fn permits(&self, candidate: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(candidate))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.patterns.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let patterns = Vec::<String>::deserialize(deserializer)?;
        PermissionSet::new(patterns).map_err(serde::de::Error::custom)
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_string_match_required() {
        let set = PermissionSet::new(vec!["/tmp/.*".to_string()]).expect("valid regex");
        assert!(set.permits("/tmp/a"));
        assert!(set.permits("/tmp/a/b"));
        assert!(!set.permits("/etc/tmp/a"), "regex must anchor to the whole string");
        assert!(!set.permits("x/tmp/a"));
    }

    #[test]
    fn empty_set_permits_nothing() {
        assert!(!PermissionSet::empty().permits("/tmp/a"));
    }

    #[test]
    fn round_trips_through_json() {
        let set = PermissionSet::new(vec!["/tmp/.*".into(), "/media/.*".into()]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.patterns(), set.patterns());
        assert!(back.permits("/media/x"));
    }
}
