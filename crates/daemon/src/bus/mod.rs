// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Bus Endpoint (C2): the concrete object-path/interface surface the
//! manager exposes on the host bus and each zone exposes on its own bus,
//! realized over `zbus`.

pub mod host_endpoint;
pub mod zone_endpoint;

use async_trait::async_trait;
use zbus::zvariant::OwnedValue;
use zn_core::Status;

pub use host_endpoint::{HostEndpoint, HostEndpointSignalSink, HOST_BUS_NAME, HOST_OBJECT_PATH};
pub use zone_endpoint::{ZoneEndpoint, ZoneEndpointSignalSink, ZONE_OBJECT_PATH, watch_display_off};

/// Per-zone capability the manager uses to emit that zone's `Notification`
/// signal and forward proxy calls onto its bus — a typed dispatch seam in
/// place of a raw callback graph.
#[async_trait]
pub trait ZoneSignals: Send + Sync {
    async fn notification(&self, container: &str, app: &str, message: &str);
}

/// Capability the manager uses to emit `ContainerDbusState` on the host bus
/// whenever a zone's reported bus address changes.
#[async_trait]
pub trait HostSignals: Send + Sync {
    async fn container_dbus_state(&self, id: &str, address: &str);
}

/// The capability the manager needs from a bus connection in order to
/// forward a proxy call: create a
/// method call addressed at `(bus_name, object_path, interface, method)`
/// and await its reply. Any bus implementation satisfying this is
/// sufficient — production code goes through `zbus`; tests substitute a
/// peer-to-peer connection pair.
#[async_trait]
pub trait BusCaller: Send + Sync {
    async fn call(
        &self,
        bus_name: &str,
        object_path: &str,
        interface: &str,
        method: &str,
        args: OwnedValue,
    ) -> Result<OwnedValue, Status>;
}

/// A `BusCaller` backed by a live `zbus::Connection`.
pub struct ZbusCaller {
    connection: zbus::Connection,
}

impl ZbusCaller {
    pub fn new(connection: zbus::Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl BusCaller for ZbusCaller {
    async fn call(
        &self,
        bus_name: &str,
        object_path: &str,
        interface: &str,
        method: &str,
        args: OwnedValue,
    ) -> Result<OwnedValue, Status> {
        let path = zbus::zvariant::ObjectPath::try_from(object_path)
            .map_err(|e| Status::Forwarded(e.to_string()))?;
        let message = self
            .connection
            .call_method(Some(bus_name), path, Some(interface), method, &(args,))
            .await
            .map_err(|e| Status::Forwarded(e.to_string()))?;
        message.body().deserialize::<OwnedValue>().map_err(|e| Status::Forwarded(e.to_string()))
    }
}

/// Map a `Status` onto a `zbus::fdo::Error` carrying the wire-level code
/// string from `Status::code()` as its message, so clients see the same
/// constants whether they're talking IPC or the bus.
pub fn status_to_fdo_error(status: &Status) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(format!("{}: {status}", status.code()))
}
