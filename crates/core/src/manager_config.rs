// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Manager-wide configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::policy::ProxyCallRule;
use crate::status::Status;
use crate::zone_config::ZoneConfig;
use crate::zone_id::ZoneId;

/// Input-monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMonitorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub device: PathBuf,
}

/// The manager-config JSON document, after resolving each entry of
/// `containerConfigs` into a loaded [`ZoneConfig`].
///
/// Immutable after construction, except for `foreground_id`, which `focus`
/// updates — everything else here never changes once the manager is
/// built.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub default_id: ZoneId,
    pub foreground_id: Option<ZoneId>,
    pub zones_path: PathBuf,
    pub run_mount_point_prefix: PathBuf,
    pub zones: Vec<ZoneConfig>,
    pub proxy_call_rules: Vec<ProxyCallRule>,
    pub input_config: InputMonitorConfig,
}

/// The raw JSON shape of a manager-config document, before zone config
/// files named in `container_configs` are resolved and loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManagerConfig {
    pub default_id: String,
    #[serde(default)]
    pub foreground_id: String,
    pub containers_path: PathBuf,
    #[serde(default)]
    pub run_mount_point_prefix: PathBuf,
    pub container_configs: Vec<PathBuf>,
    #[serde(default)]
    pub proxy_call_rules: Vec<ProxyCallRule>,
    #[serde(default)]
    pub input_config: InputMonitorConfig,
}

/// Resolve a path named inside a config document: relative paths are joined
/// onto the directory the document itself was loaded from, absolute paths
/// are used as-is.
pub fn resolve_relative(base_dir: &std::path::Path, entry: &std::path::Path) -> PathBuf {
    if entry.is_absolute() {
        entry.to_path_buf()
    } else {
        base_dir.join(entry)
    }
}

impl ManagerConfig {
    /// Load a manager-config JSON document from disk and resolve every entry
    /// of `containerConfigs` into a loaded [`ZoneConfig`]. Relative template
    /// paths are resolved against `path`'s parent directory.
    pub fn load(path: &std::path::Path) -> Result<Self, Status> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawManagerConfig = serde_json::from_str(&text)?;
        let base_dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));

        let mut zones = Vec::with_capacity(raw.container_configs.len());
        for entry in &raw.container_configs {
            let zone_path = resolve_relative(base_dir, entry);
            zones.push(ZoneConfig::load(&zone_path)?);
        }

        Self::assemble(raw, zones)
    }

    /// Assemble a `ManagerConfig` from its raw document and its zones'
    /// already-loaded configs, enforcing the construction-time invariants
    /// no `"host"` zone, and `default_id` must name a loaded zone.
    pub fn assemble(raw: RawManagerConfig, zones: Vec<ZoneConfig>) -> Result<Self, Status> {
        for zone in &zones {
            zone.validate()?;
        }

        let default_id = ZoneId::new(raw.default_id);
        if !zones.iter().any(|z| z.id == default_id) {
            return Err(Status::ConfigError(format!(
                "defaultId {default_id:?} is not present in containerConfigs"
            )));
        }

        let foreground_id = if raw.foreground_id.is_empty() {
            None
        } else {
            Some(ZoneId::new(raw.foreground_id))
        };

        Ok(Self {
            default_id,
            foreground_id,
            zones_path: raw.containers_path,
            run_mount_point_prefix: raw.run_mount_point_prefix,
            zones,
            proxy_call_rules: raw.proxy_call_rules,
            input_config: raw.input_config,
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ManagerConfig {
    /// Build a config directly from in-memory zone configs, for tests that
    /// don't want to touch the filesystem.
    pub fn for_test(default_id: &str, zones: Vec<ZoneConfig>) -> Result<Self, Status> {
        Self::assemble(
            RawManagerConfig {
                default_id: default_id.to_string(),
                foreground_id: String::new(),
                containers_path: PathBuf::from("/var/zones"),
                run_mount_point_prefix: PathBuf::from("/run/zones"),
                container_configs: Vec::new(),
                proxy_call_rules: Vec::new(),
                input_config: InputMonitorConfig::default(),
            },
            zones,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_id_is_fatal() {
        let zones = vec![ZoneConfig::for_test("za", 1)];
        let err = ManagerConfig::for_test("ghost", zones).unwrap_err();
        assert!(matches!(err, Status::ConfigError(_)));
    }

    #[test]
    fn default_id_present_succeeds() {
        let zones = vec![ZoneConfig::for_test("za", 1)];
        assert!(ManagerConfig::for_test("za", zones).is_ok());
    }

    #[test]
    fn host_zone_in_configs_is_rejected() {
        let zones = vec![ZoneConfig::for_test("za", 1), ZoneConfig::for_test("host", 2)];
        let err = ManagerConfig::for_test("za", zones).unwrap_err();
        assert!(matches!(err, Status::ConfigError(_)));
    }
}
