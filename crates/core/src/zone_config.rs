// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Static, immutable-after-load zone configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::permission_set::PermissionSet;
use crate::zone_id::ZoneId;

/// A zone's configuration, as loaded from its zone-config JSON file.
///
/// Everything here is fixed for the lifetime of the zone object; mutable
/// runtime state (lifecycle state, foreground flag, bus address) lives on
/// the zone object that wraps this config, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub root_fs_path: PathBuf,
    pub terminal_number: u32,
    /// Lower means higher priority for default foreground selection.
    pub privilege: i32,
    #[serde(default)]
    pub switch_to_default_after_timeout: bool,
    #[serde(default)]
    pub permitted_to_send: PermissionSet,
    #[serde(default)]
    pub permitted_to_recv: PermissionSet,
}

impl ZoneConfig {
    /// Load a zone-config JSON document from disk.
    pub fn load(path: &std::path::Path) -> Result<Self, crate::status::Status> {
        let text = std::fs::read_to_string(path)?;
        let cfg: ZoneConfig = serde_json::from_str(&text)?;
        Ok(cfg)
    }

    /// Validate the one invariant a config can violate on its own: the
    /// reserved `"host"` id must never name a zone.
    pub fn validate(&self) -> Result<(), crate::status::Status> {
        if self.id.is_host() {
            return Err(crate::status::Status::ConfigError(
                "zone id \"host\" is reserved and cannot be used".to_string(),
            ));
        }
        if self.id.as_str().is_empty() {
            return Err(crate::status::Status::ConfigError("zone id must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ZoneConfig {
    /// A minimal valid config for tests, with id and privilege overridable.
    pub fn for_test(id: impl Into<String>, privilege: i32) -> Self {
        Self {
            id: ZoneId::new(id),
            root_fs_path: PathBuf::from("/var/zones/test"),
            terminal_number: 1,
            privilege,
            switch_to_default_after_timeout: false,
            permitted_to_send: PermissionSet::empty(),
            permitted_to_recv: PermissionSet::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_is_rejected() {
        let cfg = ZoneConfig::for_test("host", 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ordinary_id_is_accepted() {
        let cfg = ZoneConfig::for_test("z1", 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_camel_case_json() {
        let json = r#"{
            "id": "z1",
            "rootFsPath": "/var/zones/z1",
            "terminalNumber": 2,
            "privilege": 5,
            "switchToDefaultAfterTimeout": true,
            "permittedToSend": ["/tmp/.*"],
            "permittedToRecv": []
        }"#;
        let cfg: ZoneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.id.as_str(), "z1");
        assert_eq!(cfg.terminal_number, 2);
        assert!(cfg.switch_to_default_after_timeout);
        assert!(cfg.permitted_to_send.permits("/tmp/a"));
    }
}
