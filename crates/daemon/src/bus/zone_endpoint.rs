// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The zone-bus object surface: `org.tizen.containers.domain`.
//!
//! One `ZoneEndpoint` is registered per zone, on that zone's own bus
//! connection, with `caller` fixed to that zone's id.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use zbus::fdo::DBusProxy;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedValue;
use zn_core::ZoneId;

use crate::bus::ZoneSignals;
use crate::manager::ZonesManager;

pub const ZONE_OBJECT_PATH: &str = "/org/tizen/containers/domain";

pub struct ZoneEndpoint {
    manager: Arc<ZonesManager>,
    caller: ZoneId,
}

impl ZoneEndpoint {
    pub fn new(manager: Arc<ZonesManager>, caller: ZoneId) -> Self {
        Self { manager, caller }
    }
}

#[zbus::interface(name = "org.tizen.containers.domain")]
impl ZoneEndpoint {
    async fn notify_active_container(&self, app: String, message: String) {
        self.manager.notify_active_container_handler(&self.caller, &app, &message).await;
    }

    async fn file_move_request(&self, dst: String, path: String) -> String {
        self.manager.file_move_request(self.caller.as_str(), &dst, &path).await.to_string()
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
            .proxy_call(self.caller.as_str(), &target, &bus, &path, &iface, &method, args)
            .await
            .map_err(|e| super::status_to_fdo_error(&e))
    }

    #[zbus(signal)]
    async fn notification(
        signal_emitter: &SignalEmitter<'_>,
        container: &str,
        application: &str,
        message: &str,
    ) -> zbus::Result<()>;
}

/// Emits `Notification` on one zone's own bus, installed as that `Zone`'s
/// `notify_sink` once the zone's bus endpoint is registered.
pub struct ZoneEndpointSignalSink {
    zone_id: ZoneId,
    emitter: SignalEmitter<'static>,
}

impl ZoneEndpointSignalSink {
    pub fn new(zone_id: ZoneId, emitter: SignalEmitter<'static>) -> Self {
        Self { zone_id, emitter }
    }
}

#[async_trait]
impl ZoneSignals for ZoneEndpointSignalSink {
    async fn notification(&self, container: &str, app: &str, message: &str) {
        if let Err(e) = ZoneEndpoint::notification(&self.emitter, container, app, message).await {
            tracing::warn!(zone = %self.zone_id, error = %e, "failed to emit Notification");
        }
    }
}

/// Listens for the power manager's `DisplayOff` signal on a zone's bus and
/// invokes `manager.display_off_handler()` only when the signal's sender
/// currently owns the configured well-known name: a signal from an
/// anonymous/unnamed peer is dropped.
pub async fn watch_display_off(
    connection: zbus::Connection,
    manager: Arc<ZonesManager>,
    power_manager_name: String,
) -> zbus::Result<()> {
    let dbus_proxy = DBusProxy::new(&connection).await?;
    let mut stream = zbus::MessageStream::from(&connection);

    while let Some(msg) = stream.next().await {
        let Ok(msg) = msg else { continue };
        let header = msg.header();
        if header.interface().map(|i| i.as_str()) != Some("org.tizen.power") {
            continue;
        }
        if header.member().map(|m| m.as_str()) != Some("DisplayOff") {
            continue;
        }
        let Some(sender) = header.sender() else { continue };

        let owner = dbus_proxy
            .get_name_owner(zbus::names::BusName::from_str_unchecked(&power_manager_name))
            .await
            .ok();
        if owner.as_ref().map(|o| o.as_str()) != Some(sender.as_str()) {
            continue;
        }

        manager.display_off_handler().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::try_join;
    use tokio::net::UnixStream;
    use zbus::connection::Builder;
    use zbus::object_server::SignalEmitter;
    use zn_core::{ManagerConfig, ZoneConfig};

    use super::watch_display_off;
    use crate::container::FakeContainerHandle;
    use crate::manager::{ContainerFactory, ZonesManager};

    fn factory() -> ContainerFactory {
        Arc::new(|_: &ZoneConfig| FakeContainerHandle::new() as Arc<dyn crate::container::ContainerHandle>)
    }

    /// Stands in for the real power manager on the rogue end of a p2p pair.
    /// Registered at the same interface/path `watch_display_off` listens on,
    /// but the connection emitting it owns no well-known name.
    struct RoguePowerManager;

    #[zbus::interface(name = "org.tizen.power")]
    impl RoguePowerManager {
        #[zbus(signal)]
        async fn display_off(signal_emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
    }

    #[tokio::test]
    async fn display_off_from_an_unauthenticated_sender_is_ignored() {
        let mut other = ZoneConfig::for_test("other", 1);
        other.switch_to_default_after_timeout = true;
        let config =
            ManagerConfig::for_test("default", vec![ZoneConfig::for_test("default", 1), other]).unwrap();
        let manager = ZonesManager::new(config, factory(), false);
        manager.start_all().await.unwrap();
        manager.focus(&"other".into()).await.unwrap();

        // A bare Unix socket pair stands in for a zone's private bus: no
        // message-bus daemon arbitrates it, so neither end ever acquires a
        // unique name and messages it sends carry no verifiable sender.
        let (rogue_sock, zone_sock) = UnixStream::pair().unwrap();
        let guid = zbus::Guid::generate();
        let rogue = Builder::unix_stream(rogue_sock).server(guid).unwrap().p2p().build();
        let zone_side = Builder::unix_stream(zone_sock).p2p().build();
        let (rogue, zone_side) = try_join!(rogue, zone_side).unwrap();

        rogue.object_server().at("/org/tizen/power", RoguePowerManager).await.unwrap();
        let iface_ref =
            rogue.object_server().interface::<_, RoguePowerManager>("/org/tizen/power").await.unwrap();
        RoguePowerManager::display_off(iface_ref.signal_emitter()).await.unwrap();

        let handle =
            tokio::spawn(watch_display_off(zone_side, Arc::clone(&manager), "org.tizen.power".to_string()));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert_eq!(
            manager.get_active_zone_id(),
            "other",
            "a signal with no verifiable sender must not trigger displayOffHandler"
        );
    }
}
