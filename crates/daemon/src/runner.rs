// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Runner (C7): the process entry point behind the `zonesd` binary.
//!
//! Loads config, builds the manager, starts the host bus, the IPC service
//! and (if configured) the input monitor, then blocks until `SIGTERM` or
//! `SIGINT` and drains everything in reverse startup order: input
//! monitor → bus loop → IPC → destroy zones unless detached.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use zn_core::{ManagerConfig, ZoneConfig, ZoneId};

use crate::bus::{
    watch_display_off, HostEndpoint, HostEndpointSignalSink, ZbusCaller, ZoneEndpoint, ZoneEndpointSignalSink,
    HOST_BUS_NAME, HOST_OBJECT_PATH, ZONE_OBJECT_PATH,
};
use crate::container::{ContainerHandle, NullContainerHandle};
use crate::input_monitor::{DevInputGestureSource, InputMonitor};
use crate::ipc::IpcService;
use crate::manager::{ContainerFactory, ZonesManager};

/// Well-known bus name `watch_display_off` requires as the `DisplayOff`
/// sender. Not exposed as a config field; kept as a constant here, see
/// `DESIGN.md`.
const POWER_MANAGER_BUS_NAME: &str = "org.tizen.power";

/// CLI-gathered options the runner needs (kept separate from `clap`'s
/// derive struct so this module stays testable without pulling in `clap`).
pub struct RunnerOptions {
    pub config_path: PathBuf,
    pub detach_on_exit: bool,
}

/// Run the daemon to completion, returning the process exit code: 0 on
/// clean shutdown, 1 if a startup step fails.
pub async fn run(opts: RunnerOptions) -> i32 {
    let config = match ManagerConfig::load(&opts.config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %opts.config_path.display(), "failed to load manager config");
            return 1;
        }
    };

    let socket_path = default_socket_path(&config);
    let input_enabled = config.input_config.enabled;
    let input_device = config.input_config.device.clone();

    let factory: ContainerFactory = Arc::new(|_cfg: &ZoneConfig| NullContainerHandle::new() as Arc<dyn ContainerHandle>);
    let manager = ZonesManager::new(config, factory, opts.detach_on_exit);
    bridge_zone_bus_connections(&manager);

    if let Err(e) = manager.start_all().await {
        error!(error = %e, "failed to start zones");
        return 1;
    }

    let ipc = IpcService::new(&socket_path);
    if let Err(e) = ipc.start().await {
        error!(error = %e, socket = %socket_path.display(), "failed to start ipc service");
        manager.stop_all().await;
        return 1;
    }

    let host_connection = match start_host_bus(Arc::clone(&manager)).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to start host bus connection");
            ipc.stop();
            manager.stop_all().await;
            return 1;
        }
    };

    let input_monitor = if input_enabled {
        let monitor = InputMonitor::new(Arc::clone(&manager));
        monitor.spawn(DevInputGestureSource::new(input_device));
        Some(monitor)
    } else {
        None
    };

    info!(socket = %socket_path.display(), "zonesd ready");
    wait_for_shutdown_signal().await;
    info!("shutting down");

    if let Some(monitor) = &input_monitor {
        monitor.stop();
    }
    drop(host_connection);
    ipc.stop();
    manager.stop_all().await;

    0
}

/// Register the host-bus object and wire `ContainerDbusState`/`ProxyCall`
/// so the manager can emit signals and forward host-originated proxy calls.
async fn start_host_bus(manager: Arc<ZonesManager>) -> zbus::Result<zbus::Connection> {
    let endpoint = HostEndpoint::new(Arc::clone(&manager));
    let connection =
        zbus::connection::Builder::session()?.name(HOST_BUS_NAME)?.serve_at(HOST_OBJECT_PATH, endpoint)?.build().await?;

    let iface_ref = connection.object_server().interface::<_, HostEndpoint>(HOST_OBJECT_PATH).await?;
    let emitter = iface_ref.signal_emitter().to_owned();
    manager.set_host_signals(Arc::new(HostEndpointSignalSink::new(emitter)));
    manager.set_host_caller(Arc::new(ZbusCaller::new(connection.clone())));

    Ok(connection)
}

/// Subscribes to every zone's bus-address change and, the first time a
/// zone reports a non-empty address, connects to it, registers that zone's
/// `ZoneEndpoint`, and starts its `watch_display_off` loop. The manager
/// itself stays bus-agnostic; this closure is the runner's half of that
/// split.
fn bridge_zone_bus_connections(manager: &Arc<ZonesManager>) {
    let manager_for_cb = Arc::clone(manager);
    manager.add_state_callback(move |zone_id, address| {
        if address.is_empty() {
            return;
        }
        let manager = Arc::clone(&manager_for_cb);
        let zone_id = zone_id.clone();
        let address = address.to_string();
        tokio::spawn(async move {
            if let Err(e) = connect_zone_bus(manager, zone_id.clone(), address).await {
                warn!(zone = %zone_id, error = %e, "failed to connect to zone bus");
            }
        });
    });
}

async fn connect_zone_bus(manager: Arc<ZonesManager>, zone_id: ZoneId, address: String) -> zbus::Result<()> {
    let zone = match manager.zone_handle(zone_id.as_str()) {
        Ok(z) => z,
        Err(e) => {
            warn!(zone = %zone_id, error = %e, "zone bus address reported for unknown zone");
            return Ok(());
        }
    };

    if zone.bus_caller().is_some() {
        return Ok(());
    }

    let endpoint = ZoneEndpoint::new(Arc::clone(&manager), zone_id.clone());
    let connection = zbus::connection::Builder::address(address.as_str())?.serve_at(ZONE_OBJECT_PATH, endpoint)?.build().await?;

    let iface_ref = connection.object_server().interface::<_, ZoneEndpoint>(ZONE_OBJECT_PATH).await?;
    let emitter = iface_ref.signal_emitter().to_owned();
    zone.set_notify_sink(Arc::new(ZoneEndpointSignalSink::new(zone_id.clone(), emitter)));
    zone.set_bus_caller(Arc::new(ZbusCaller::new(connection.clone())));

    tokio::spawn(async move {
        if let Err(e) = watch_display_off(connection, manager, POWER_MANAGER_BUS_NAME.to_string()).await {
            warn!(zone = %zone_id, error = %e, "watch_display_off loop ended");
        }
    });

    Ok(())
}

fn default_socket_path(config: &ManagerConfig) -> PathBuf {
    if !config.run_mount_point_prefix.as_os_str().is_empty() {
        config.run_mount_point_prefix.join("zonesd.sock")
    } else {
        dirs::runtime_dir().unwrap_or_else(std::env::temp_dir).join("zonesd.sock")
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = term.recv() => info!("received SIGTERM"),
        _ = interrupt.recv() => info!("received SIGINT"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zn_core::ManagerConfig;

    #[test]
    fn default_socket_path_prefers_configured_run_prefix() {
        let zones = vec![ZoneConfig::for_test("z1", 1)];
        let config = ManagerConfig::for_test("z1", zones).unwrap();
        let path = default_socket_path(&config);
        assert_eq!(path, config.run_mount_point_prefix.join("zonesd.sock"));
    }

    #[tokio::test]
    async fn run_returns_one_when_config_is_missing() {
        let opts = RunnerOptions { config_path: PathBuf::from("/nonexistent/manager.json"), detach_on_exit: false };
        assert_eq!(run(opts).await, 1);
    }
}
