// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Zone identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// The id reserved for the host domain. Never a valid entry in the zone map.
pub const HOST_ID: &str = "host";

/// Unique identifier for a zone.
///
/// Unlike the system's other ids, a `ZoneId` is not generated — it is the
/// operator-chosen name from a zone's configuration file, so it is a plain
/// string newtype rather than a prefixed random id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    /// Create a new `ZoneId` from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the reserved `"host"` id, which may never name a zone.
    pub fn is_host(&self) -> bool {
        self.0 == HOST_ID
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ZoneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for ZoneId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ZoneId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for ZoneId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
