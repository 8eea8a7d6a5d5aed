// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Zones Manager (C5): owns the zone map, drives foreground
//! selection, and serves the host-bus methods.

mod file_move;
mod proxy;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};
use zn_core::{ManagerConfig, PolicyEngine, Status, SubscriptionId, SubscriptionSet, ZoneConfig, ZoneId};

use crate::bus::{BusCaller, HostSignals};
use crate::container::ContainerHandle;
use crate::zone::Zone;

/// Builds a `ContainerHandle` for a freshly loaded `ZoneConfig`. Supplied by
/// the runner at construction time so the manager never depends on a
/// concrete container runtime.
pub type ContainerFactory = Arc<dyn Fn(&ZoneConfig) -> Arc<dyn ContainerHandle> + Send + Sync>;

struct ManagerState {
    order: Vec<ZoneId>,
    zones: HashMap<ZoneId, Arc<Zone>>,
    foreground_id: Option<ZoneId>,
}

/// The central state machine owning every zone for the daemon's lifetime.
pub struct ZonesManager {
    state: RwLock<ManagerState>,
    default_id: ZoneId,
    zones_path: PathBuf,
    policy: PolicyEngine,
    container_factory: ContainerFactory,
    host_caller: RwLock<Option<Arc<dyn BusCaller>>>,
    host_signals: RwLock<Option<Arc<dyn HostSignals>>>,
    subscriptions: Mutex<SubscriptionSet>,
    detach_on_exit: bool,
}

impl ZonesManager {
    /// Construct the manager and every zone named in `config`, wiring each
    /// zone's container `on_bus_address_changed` callback to fan out to
    /// subscribers and the host `ContainerDbusState` signal.
    pub fn new(config: ManagerConfig, container_factory: ContainerFactory, detach_on_exit: bool) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<ZonesManager>| {
            let mut order = Vec::with_capacity(config.zones.len());
            let mut zones = HashMap::with_capacity(config.zones.len());

            for zone_config in config.zones {
                let id = zone_config.id.clone();
                let container = container_factory(&zone_config);

                let weak_for_cb = weak.clone();
                let id_for_cb = id.clone();
                container.on_bus_address_changed(Box::new(move |address: &str| {
                    let Some(manager) = weak_for_cb.upgrade() else { return };
                    let id = id_for_cb.clone();
                    let address = address.to_string();
                    tokio::spawn(async move {
                        manager.on_zone_bus_address_changed(&id, &address).await;
                    });
                }));

                let zone = Arc::new(Zone::new(zone_config, container));
                zone.set_detach_on_exit(detach_on_exit);
                order.push(id.clone());
                zones.insert(id, zone);
            }

            Self {
                state: RwLock::new(ManagerState { order, zones, foreground_id: config.foreground_id }),
                default_id: config.default_id,
                zones_path: config.zones_path,
                policy: PolicyEngine::new(&config.proxy_call_rules),
                container_factory,
                host_caller: RwLock::new(None),
                host_signals: RwLock::new(None),
                subscriptions: Mutex::new(SubscriptionSet::new()),
                detach_on_exit,
            }
        })
    }

    pub fn zones_path(&self) -> &std::path::Path {
        &self.zones_path
    }

    pub fn set_host_caller(&self, caller: Arc<dyn BusCaller>) {
        *self.host_caller.write() = Some(caller);
    }

    pub fn set_host_signals(&self, sink: Arc<dyn HostSignals>) {
        *self.host_signals.write() = Some(sink);
    }

    /// Look up a zone by id. Exposed so the runner can wire a zone's bus
    /// connection once its address becomes known.
    pub fn zone_handle(&self, id: &str) -> Result<Arc<Zone>, Status> {
        self.zone(id)
    }

    fn zone(&self, id: &str) -> Result<Arc<Zone>, Status> {
        self.state
            .read()
            .zones
            .get(id)
            .cloned()
            .ok_or_else(|| Status::UnknownTarget(ZoneId::new(id)))
    }

    async fn on_zone_bus_address_changed(&self, id: &ZoneId, address: &str) {
        info!(zone = %id, address, "zone bus address changed");
        if let Some(sink) = self.host_signals.read().clone() {
            sink.container_dbus_state(id.as_str(), address).await;
        }
        self.subscriptions.lock().notify_all(id, address);
    }

    pub fn add_state_callback(&self, callback: impl Fn(&ZoneId, &str) + Send + Sync + 'static) -> SubscriptionId {
        self.subscriptions.lock().add(callback)
    }

    pub fn del_state_callback(&self, id: SubscriptionId) -> bool {
        self.subscriptions.lock().remove(id)
    }

    // --- Host-bus read methods ---

    pub fn get_zone_ids(&self) -> Vec<String> {
        self.state.read().order.iter().map(|id| id.as_str().to_string()).collect()
    }

    pub fn get_active_zone_id(&self) -> String {
        self.state.read().foreground_id.as_ref().map(|id| id.as_str().to_string()).unwrap_or_default()
    }

    pub fn get_zone_dbuses(&self) -> HashMap<String, String> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.zones.get(id))
            .map(|z| (z.id().as_str().to_string(), z.bus_address()))
            .collect()
    }

    // --- Foreground selection ---

    /// `focus(id)`: background every zone, then foreground the target.
    /// Idempotent: calling it twice in a row
    /// leaves the same observable state as calling it once.
    pub async fn focus(&self, id: &ZoneId) -> Result<(), Status> {
        let target = self.zone(id.as_str())?;
        if !target.is_running() {
            return Err(Status::TargetStopped(id.clone()));
        }

        let all: Vec<Arc<Zone>> = {
            let state = self.state.read();
            state.order.iter().filter_map(|zid| state.zones.get(zid)).cloned().collect()
        };

        for zone in &all {
            if zone.is_running() {
                if let Err(e) = zone.go_background().await {
                    warn!(zone = %zone.id(), error = %e, "go_background failed during focus");
                }
            }
        }

        target.go_foreground().await?;
        self.state.write().foreground_id = Some(id.clone());
        Ok(())
    }

    /// `start_all()`: start every zone in map order, then pick the
    /// foreground zone (configured if it started, else lowest `privilege`,
    /// ties broken by id order).
    pub async fn start_all(&self) -> Result<(), Status> {
        let all: Vec<Arc<Zone>> = {
            let state = self.state.read();
            state.order.iter().filter_map(|zid| state.zones.get(zid)).cloned().collect()
        };

        for zone in &all {
            if let Err(e) = zone.start().await {
                error!(zone = %zone.id(), error = %e, "zone failed to start");
            }
        }

        let configured = self.state.read().foreground_id.clone();
        let chosen = match configured {
            Some(id) if all.iter().any(|z| z.id() == &id && z.is_running()) => Some(id),
            _ => all
                .iter()
                .filter(|z| z.is_running())
                .min_by(|a, b| {
                    a.config.privilege.cmp(&b.config.privilege).then_with(|| a.id().as_str().cmp(b.id().as_str()))
                })
                .map(|z| z.id().clone()),
        };

        if let Some(id) = chosen {
            self.focus(&id).await?;
        }

        Ok(())
    }

    /// `stop_all()`: stop every zone; a single failure is logged and
    /// swallowed so it does not strand the others.
    pub async fn stop_all(&self) {
        let all: Vec<Arc<Zone>> = {
            let state = self.state.read();
            state.order.iter().filter_map(|zid| state.zones.get(zid)).cloned().collect()
        };
        for zone in &all {
            if zone.detach_on_exit() {
                continue;
            }
            if let Err(e) = zone.stop().await {
                error!(zone = %zone.id(), error = %e, "zone failed to stop during stop_all");
            }
        }
    }

    // --- Zone lifecycle wrappers ---

    pub async fn shutdown_zone(&self, id: &str) -> Result<(), Status> {
        self.zone(id)?.shutdown().await
    }

    pub async fn start_zone(&self, id: &str) -> Result<(), Status> {
        self.zone(id)?.start().await
    }

    pub fn lock_zone(&self, id: &str) -> Result<(), Status> {
        self.zone(id)?.lock()
    }

    pub fn unlock_zone(&self, id: &str) -> Result<(), Status> {
        self.zone(id)?.unlock()
    }

    pub fn grant_device(&self, id: &str, device: &str, flags: u32) -> Result<(), Status> {
        self.zone(id)?.grant_device(device, flags)
    }

    pub fn revoke_device(&self, id: &str, device: &str) -> Result<(), Status> {
        self.zone(id)?.revoke_device(device)
    }

    /// `CreateZone(id, template_name)`.
    pub async fn create_zone(&self, id: &str, template_name: &str) -> Result<(), Status> {
        let zone_id = ZoneId::new(id);
        if zone_id.is_host() {
            return Err(Status::ConfigError("zone id \"host\" is reserved".to_string()));
        }
        if self.state.read().zones.contains_key(&zone_id) {
            return Err(Status::ConfigError(format!("zone {id:?} already exists")));
        }

        let template_path = zn_core::resolve_relative(&self.zones_path, std::path::Path::new(template_name));
        let zone_config = ZoneConfig::load(&template_path)?;
        zone_config.validate()?;

        let container = (self.container_factory)(&zone_config);
        let zone = Arc::new(Zone::new(zone_config, container));
        zone.set_detach_on_exit(self.detach_on_exit);

        let mut state = self.state.write();
        state.order.push(zone_id.clone());
        state.zones.insert(zone_id, zone);
        Ok(())
    }

    /// `DestroyZone(id, force)`. `force` is accepted but does
    /// not currently change behavior — see `DESIGN.md`.
    pub async fn destroy_zone(&self, id: &str, _force: bool) -> Result<(), Status> {
        let zone_id = ZoneId::new(id);
        let zone = self.zone(id)?;

        if zone.is_running() {
            zone.stop().await?;
        }

        let mut state = self.state.write();
        state.zones.remove(&zone_id);
        state.order.retain(|z| z != &zone_id);
        if state.foreground_id.as_ref() == Some(&zone_id) {
            state.foreground_id = None;
        }
        Ok(())
    }

    // --- Cross-zone notification and shared-resource arbitration ---

    /// `displayOffHandler`: returns to the default zone when the current
    /// foreground zone opts into switch-to-default.
    pub async fn display_off_handler(&self) {
        let foreground = {
            let state = self.state.read();
            state.foreground_id.as_ref().and_then(|id| state.zones.get(id)).cloned()
        };
        let Some(zone) = foreground else { return };
        if zone.is_running() && zone.config.switch_to_default_after_timeout {
            let default_id = self.default_id.clone();
            if let Err(e) = self.focus(&default_id).await {
                warn!(error = %e, "displayOffHandler failed to focus default zone");
            }
        }
    }

    /// `notifyActiveContainerHandler`: deliver to the foreground zone
    /// unless it is the caller itself. Errors are logged, never propagated.
    pub async fn notify_active_container_handler(&self, caller: &ZoneId, app: &str, message: &str) {
        let foreground = {
            let state = self.state.read();
            state.foreground_id.as_ref().and_then(|id| state.zones.get(id)).cloned()
        };
        let Some(zone) = foreground else { return };
        if zone.id() == caller {
            return;
        }
        if let Err(e) = zone.send_notification(caller.as_str(), app, message).await {
            warn!(zone = %zone.id(), error = %e, "notifyActiveContainerHandler delivery failed");
        }
    }

    /// Round-robins the foreground zone to the next running zone in map
    /// order.
    pub async fn rotate_foreground(&self) {
        let (order, current) = {
            let state = self.state.read();
            (state.order.clone(), state.foreground_id.clone())
        };
        if order.is_empty() {
            return;
        }

        let running: Vec<&ZoneId> = {
            let state = self.state.read();
            order.iter().filter(|id| state.zones.get(*id).map(|z| z.is_running()).unwrap_or(false)).collect()
        };
        if running.is_empty() {
            return;
        }

        let next = match current.as_ref().and_then(|cur| running.iter().position(|id| *id == cur)) {
            Some(pos) => running[(pos + 1) % running.len()],
            None => running[0],
        };

        if let Err(e) = self.focus(&next.clone()).await {
            warn!(error = %e, "rotate_foreground failed");
        }
    }
}
