// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The per-zone lifecycle state machine (C4).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use zn_core::{Status, ZoneConfig, ZoneId, ZoneState};

use crate::bus::{BusCaller, ZoneSignals};
use crate::container::ContainerHandle;

struct ZoneInner {
    state: ZoneState,
    foreground: bool,
    detach_on_exit: bool,
}

/// A managed zone: its static config plus the mutable lifecycle state the
/// manager and the zone's own bus endpoint drive.
///
/// Internal state is protected by a per-zone mutex: operations on a
/// single zone are serialized by it, independent of any other zone's.
pub struct Zone {
    pub config: ZoneConfig,
    container: Arc<dyn ContainerHandle>,
    inner: Mutex<ZoneInner>,
    /// Set once this zone's own bus connection is established, used to
    /// forward proxy calls whose target is this zone.
    bus_caller: Mutex<Option<Arc<dyn BusCaller>>>,
    /// Set once this zone's bus endpoint connects; used to emit
    /// `Notification` on this zone's own bus.
    notify_sink: Mutex<Option<Arc<dyn ZoneSignals>>>,
}

impl Zone {
    pub fn new(config: ZoneConfig, container: Arc<dyn ContainerHandle>) -> Self {
        Self {
            config,
            container,
            inner: Mutex::new(ZoneInner {
                state: ZoneState::Stopped,
                foreground: false,
                detach_on_exit: false,
            }),
            bus_caller: Mutex::new(None),
            notify_sink: Mutex::new(None),
        }
    }

    pub fn set_bus_caller(&self, caller: Arc<dyn BusCaller>) {
        *self.bus_caller.lock() = Some(caller);
    }

    pub fn bus_caller(&self) -> Option<Arc<dyn BusCaller>> {
        self.bus_caller.lock().clone()
    }

    pub fn set_notify_sink(&self, sink: Arc<dyn ZoneSignals>) {
        *self.notify_sink.lock() = Some(sink);
    }

    pub fn id(&self) -> &ZoneId {
        &self.config.id
    }

    pub fn state(&self) -> ZoneState {
        self.inner.lock().state
    }

    /// `is_running()`: true iff state ∈ {RUNNING, LOCKED}.
    pub fn is_running(&self) -> bool {
        self.inner.lock().state.is_running()
    }

    pub fn is_foreground(&self) -> bool {
        self.inner.lock().foreground
    }

    pub fn bus_address(&self) -> String {
        self.container.bus_address()
    }

    /// `set_detach_on_exit()`: the manager's teardown skips `stop()` for this
    /// zone when set.
    pub fn set_detach_on_exit(&self, detach: bool) {
        self.inner.lock().detach_on_exit = detach;
    }

    pub fn detach_on_exit(&self) -> bool {
        self.inner.lock().detach_on_exit
    }

    /// STOPPED → STARTING → RUNNING.
    pub async fn start(&self) -> Result<(), Status> {
        {
            let mut guard = self.inner.lock();
            if guard.state.is_running() {
                return Ok(());
            }
            guard.state = ZoneState::Starting;
        }
        match self.container.start().await {
            Ok(()) => {
                self.inner.lock().state = ZoneState::Running;
                Ok(())
            }
            Err(e) => {
                warn!(zone = %self.id(), error = %e, "zone start failed");
                {
                    let mut guard = self.inner.lock();
                    guard.state = ZoneState::Aborting;
                    guard.state = ZoneState::Stopped;
                }
                Err(Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })
            }
        }
    }

    /// RUNNING/LOCKED → STOPPING → STOPPED.
    pub async fn stop(&self) -> Result<(), Status> {
        {
            let mut guard = self.inner.lock();
            if guard.state == ZoneState::Stopped {
                return Ok(());
            }
            guard.state = ZoneState::Stopping;
            guard.foreground = false;
        }
        let result = self.container.stop().await;
        self.inner.lock().state = ZoneState::Stopped;
        result.map_err(|e| Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })
    }

    /// `shutdown()` is the graceful variant of stop() (both land on the same
    /// RUNNING → STOPPING → STOPPED edge).
    pub async fn shutdown(&self) -> Result<(), Status> {
        {
            let mut guard = self.inner.lock();
            if guard.state == ZoneState::Stopped {
                return Ok(());
            }
            guard.state = ZoneState::Stopping;
            guard.foreground = false;
        }
        let result = self.container.shutdown().await;
        self.inner.lock().state = ZoneState::Stopped;
        result.map_err(|e| Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })
    }

    /// RUNNING → LOCKED.
    pub fn lock(&self) -> Result<(), Status> {
        let mut guard = self.inner.lock();
        match guard.state {
            ZoneState::Running => {
                guard.state = ZoneState::Locked;
                Ok(())
            }
            ZoneState::Locked => Ok(()),
            _ => Err(Status::TargetStopped(self.id().clone())),
        }
    }

    /// LOCKED → RUNNING.
    pub fn unlock(&self) -> Result<(), Status> {
        let mut guard = self.inner.lock();
        match guard.state {
            ZoneState::Locked => {
                guard.state = ZoneState::Running;
                Ok(())
            }
            ZoneState::Running => Ok(()),
            _ => Err(Status::TargetStopped(self.id().clone())),
        }
    }

    /// Idempotent: calling twice has the same effect as once.
    pub async fn go_foreground(&self) -> Result<(), Status> {
        if !self.is_running() {
            return Err(Status::TargetStopped(self.id().clone()));
        }
        self.container
            .set_foreground()
            .await
            .map_err(|e| Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })?;
        self.inner.lock().foreground = true;
        Ok(())
    }

    /// Idempotent: calling twice has the same effect as once.
    pub async fn go_background(&self) -> Result<(), Status> {
        if !self.is_running() {
            return Err(Status::TargetStopped(self.id().clone()));
        }
        self.container
            .set_background()
            .await
            .map_err(|e| Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })?;
        self.inner.lock().foreground = false;
        Ok(())
    }

    /// Device grant/revoke are rejected with `ZONE_STOPPED` (i.e.
    /// `Status::TargetStopped`) whenever the zone is not running. The
    /// underlying device plumbing is the container runtime's concern,
    /// assumed available out-of-scope here.
    pub fn grant_device(&self, device: &str, flags: u32) -> Result<(), Status> {
        if !self.is_running() {
            return Err(Status::TargetStopped(self.id().clone()));
        }
        info!(zone = %self.id(), device, flags, "device granted");
        Ok(())
    }

    pub fn revoke_device(&self, device: &str) -> Result<(), Status> {
        if !self.is_running() {
            return Err(Status::TargetStopped(self.id().clone()));
        }
        info!(zone = %self.id(), device, "device revoked");
        Ok(())
    }

    /// Calls the container adapter's `send_notification` primitive and, if
    /// this zone's own bus endpoint has connected, also emits the
    /// `Notification` signal on that bus.
    pub async fn send_notification(&self, container: &str, app: &str, message: &str) -> Result<(), Status> {
        self.container
            .send_notification(container, app, message)
            .await
            .map_err(|e| Status::ZoneOperationError { zone: self.id().clone(), reason: e.to_string() })?;
        if let Some(sink) = self.notify_sink.lock().clone() {
            sink.notification(container, app, message).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::FakeContainerHandle;

    fn zone(id: &str) -> Zone {
        Zone::new(ZoneConfig::for_test(id, 1), FakeContainerHandle::new())
    }

    #[tokio::test]
    async fn start_transitions_to_running() {
        let z = zone("z1");
        assert_eq!(z.state(), ZoneState::Stopped);
        z.start().await.unwrap();
        assert_eq!(z.state(), ZoneState::Running);
        assert!(z.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let z = zone("z1");
        z.start().await.unwrap();
        z.stop().await.unwrap();
        z.stop().await.unwrap();
        assert_eq!(z.state(), ZoneState::Stopped);
    }

    #[tokio::test]
    async fn lock_unlock_round_trip() {
        let z = zone("z1");
        z.start().await.unwrap();
        z.lock().unwrap();
        assert_eq!(z.state(), ZoneState::Locked);
        assert!(z.is_running(), "locked zones are still considered running");
        z.unlock().unwrap();
        assert_eq!(z.state(), ZoneState::Running);
    }

    #[tokio::test]
    async fn go_foreground_twice_is_idempotent() {
        let z = zone("z1");
        z.start().await.unwrap();
        z.go_foreground().await.unwrap();
        z.go_foreground().await.unwrap();
        assert!(z.is_foreground());
    }

    #[yare::parameterized(
        grant = { "grant" },
        revoke = { "revoke" },
    )]
    fn device_ops_are_rejected_when_the_zone_is_stopped(op: &str) {
        let z = zone("z1");
        let result = match op {
            "grant" => z.grant_device("usb0", 0),
            _ => z.revoke_device("usb0"),
        };
        assert!(matches!(result.unwrap_err(), Status::TargetStopped(_)));
    }

    #[tokio::test]
    async fn device_ops_allowed_when_running() {
        let z = zone("z1");
        z.start().await.unwrap();
        assert!(z.grant_device("usb0", 0).is_ok());
        assert!(z.revoke_device("usb0").is_ok());
    }

    #[tokio::test]
    async fn failed_start_returns_to_stopped() {
        let container = FakeContainerHandle::new();
        container.set_fail_start(true);
        let z = Zone::new(ZoneConfig::for_test("z1", 1), container);
        assert!(z.start().await.is_err());
        assert_eq!(z.state(), ZoneState::Stopped);
    }
}
