// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The container-runtime adapter trait.
//!
//! `Zone` never matches on a concrete runtime; it holds an
//! `Arc<dyn ContainerHandle>` and drives it through the five verbs a real
//! container runtime is assumed to provide.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a concrete container runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container failed to start: {0}")]
    StartFailed(String),
    #[error("container failed to stop: {0}")]
    StopFailed(String),
    #[error("container failed to shut down: {0}")]
    ShutdownFailed(String),
    #[error("foreground/background switch failed: {0}")]
    FocusFailed(String),
    #[error("notification delivery failed: {0}")]
    NotifyFailed(String),
}

/// Callback invoked whenever the container's reported bus address changes,
/// including connect (empty → address) and disconnect (address → empty).
pub type BusAddressChangedCallback = Box<dyn Fn(&str) + Send + Sync>;

/// The primitive operations a container runtime must provide.
///
/// All operations are idempotent with respect to re-entry after success —
/// calling `start` on an already-started container is a no-op success, not
/// an error.
#[async_trait]
pub trait ContainerHandle: Send + Sync {
    async fn start(&self) -> Result<(), ContainerError>;
    async fn stop(&self) -> Result<(), ContainerError>;
    async fn shutdown(&self) -> Result<(), ContainerError>;
    async fn set_foreground(&self) -> Result<(), ContainerError>;
    async fn set_background(&self) -> Result<(), ContainerError>;
    fn is_running(&self) -> bool;
    async fn send_notification(
        &self,
        container: &str,
        app: &str,
        message: &str,
    ) -> Result<(), ContainerError>;
    fn bus_address(&self) -> String;
    fn on_bus_address_changed(&self, cb: BusAddressChangedCallback);
}

/// Default production `ContainerHandle`: a placeholder that tracks running
/// state in memory but never actually isolates anything or reports a bus
/// address. Wiring a real container runtime (namespaces, cgroups, the
/// container's own message bus) is the one integration point this crate
/// assumes is supplied externally — swap the runner's
/// `ContainerFactory` to build a real adapter instead of this one.
pub struct NullContainerHandle {
    running: std::sync::atomic::AtomicBool,
}

impl NullContainerHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { running: std::sync::atomic::AtomicBool::new(false) })
    }
}

#[async_trait]
impl ContainerHandle for NullContainerHandle {
    async fn start(&self) -> Result<(), ContainerError> {
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ContainerError> {
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ContainerError> {
        self.stop().await
    }

    async fn set_foreground(&self) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn set_background(&self) -> Result<(), ContainerError> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn send_notification(&self, _container: &str, _app: &str, _message: &str) -> Result<(), ContainerError> {
        Ok(())
    }

    fn bus_address(&self) -> String {
        String::new()
    }

    fn on_bus_address_changed(&self, _cb: BusAddressChangedCallback) {}
}


#[cfg(test)]
pub use fake::FakeContainerHandle;
