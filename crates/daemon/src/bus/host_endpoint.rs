// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The host-bus object surface: `org.tizen.containers.host`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedValue;

use crate::bus::HostSignals;
use crate::manager::ZonesManager;

pub const HOST_BUS_NAME: &str = "org.tizen.containers.host";
pub const HOST_OBJECT_PATH: &str = "/org/tizen/containers/host";

/// The `zbus::interface` implementation backing the host bus object.
///
/// Every method is a thin translation from the bus call's typed arguments
/// into a `ZonesManager` call and back, mapping `Status` onto
/// `zbus::fdo::Error` on failure.
pub struct HostEndpoint {
    manager: Arc<ZonesManager>,
}

impl HostEndpoint {
    pub fn new(manager: Arc<ZonesManager>) -> Self {
        Self { manager }
    }
}

#[zbus::interface(name = "org.tizen.containers.host")]
impl HostEndpoint {
    async fn get_zone_ids(&self) -> Vec<String> {
        self.manager.get_zone_ids()
    }

    async fn get_active_zone_id(&self) -> String {
        self.manager.get_active_zone_id()
    }

    async fn set_active_zone(&self, id: String) -> zbus::fdo::Result<()> {
        self.manager.focus(&id.into()).await.map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn get_zone_dbuses(&self) -> HashMap<String, String> {
        self.manager.get_zone_dbuses()
    }

    async fn create_zone(&self, id: String, template_name: String) -> zbus::fdo::Result<()> {
        self.manager.create_zone(&id, &template_name).await.map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn destroy_zone(&self, id: String, force: bool) -> zbus::fdo::Result<()> {
        self.manager.destroy_zone(&id, force).await.map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn shutdown_zone(&self, id: String) -> zbus::fdo::Result<()> {
        self.manager.shutdown_zone(&id).await.map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn start_zone(&self, id: String) -> zbus::fdo::Result<()> {
        self.manager.start_zone(&id).await.map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn lock_zone(&self, id: String) -> zbus::fdo::Result<()> {
        self.manager.lock_zone(&id).map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn unlock_zone(&self, id: String) -> zbus::fdo::Result<()> {
        self.manager.unlock_zone(&id).map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn grant_device(&self, id: String, device: String, flags: u32) -> zbus::fdo::Result<()> {
        self.manager.grant_device(&id, &device, flags).map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn revoke_device(&self, id: String, device: String) -> zbus::fdo::Result<()> {
        self.manager.revoke_device(&id, &device).map_err(|e| super::status_to_fdo_error(&e))
    }

    async fn proxy_call(
        &self,
        target: String,
        bus: String,
        path: String,
        iface: String,
        method: String,
        args: OwnedValue,
    ) -> zbus::fdo::Result<OwnedValue> {
        self.manager
            .proxy_call(zn_core::host_caller(), &target, &bus, &path, &iface, &method, args)
            .await
            .map_err(|e| super::status_to_fdo_error(&e))
    }

    #[zbus(signal)]
    async fn container_dbus_state(
        signal_emitter: &SignalEmitter<'_>,
        id: &str,
        address: &str,
    ) -> zbus::Result<()>;
}

/// Emits `ContainerDbusState` using the `SignalEmitter` obtained once this
/// object is registered on the host connection's `ObjectServer`.
pub struct HostEndpointSignalSink {
    emitter: SignalEmitter<'static>,
}

impl HostEndpointSignalSink {
    pub fn new(emitter: SignalEmitter<'static>) -> Self {
        Self { emitter }
    }
}

#[async_trait]
impl HostSignals for HostEndpointSignalSink {
    async fn container_dbus_state(&self, id: &str, address: &str) {
        if let Err(e) = HostEndpoint::container_dbus_state(&self.emitter, id, address).await {
            tracing::warn!(error = %e, "failed to emit ContainerDbusState");
        }
    }
}
