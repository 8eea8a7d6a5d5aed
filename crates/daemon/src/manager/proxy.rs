// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Proxy-Call Router: authorize a call against the policy engine,
//! then forward it to the host bus or a running zone's bus.

use zbus::zvariant::OwnedValue;
use zn_core::{Effect, ProxyCallTuple, Status, ZoneId};

use super::ZonesManager;

impl ZonesManager {
    /// Authorize `(caller, target, bus, path, iface, method)` against the
    /// policy engine, then forward the call. Host forwarding requires
    /// `set_host_caller` to have run; zone forwarding requires the target
    /// zone to be running and its own bus endpoint to have connected.
    pub async fn proxy_call(
        &self,
        caller: &str,
        target: &str,
        bus: &str,
        path: &str,
        iface: &str,
        method: &str,
        args: OwnedValue,
    ) -> Result<OwnedValue, Status> {
        let tuple = ProxyCallTuple {
            caller,
            target,
            bus_name: bus,
            object_path: path,
            interface: iface,
            method,
        };
        if self.policy.evaluate(&tuple) != Effect::Allow {
            return Err(Status::PolicyDenied);
        }

        let forwarder = if target == zn_core::host_caller() {
            self.host_caller
                .read()
                .clone()
                .ok_or_else(|| Status::Fatal("host bus caller not installed".to_string()))?
        } else {
            let zone_id = ZoneId::new(target);
            let zone = self.zone(target)?;
            if !zone.is_running() {
                return Err(Status::TargetStopped(zone_id));
            }
            zone.bus_caller()
                .ok_or_else(|| Status::TargetStopped(zone_id))?
        };

        forwarder
            .call(bus, path, iface, method, args)
            .await
            .map_err(|e| Status::Forwarded(e.to_string()))
    }
}
