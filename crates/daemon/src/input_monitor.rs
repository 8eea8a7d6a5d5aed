// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Input Monitor (C6): watches a configured input device for a
//! switch gesture and rotates the foreground zone on each one.
//!
//! Input-device driver internals are explicitly out of scope, so the
//! actual device is read through [`GestureSource`] — the same
//! "primitive adapter behind a trait" shape as [`crate::container::ContainerHandle`].
//! The production source, [`DevInputGestureSource`], treats any successful
//! read from the device file as one gesture; a real evdev-protocol decoder
//! would replace only that trait impl.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::manager::ZonesManager;

#[derive(Debug, Error)]
pub enum GestureSourceError {
    #[error("failed to open input device {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },
    #[error("input device read failed: {0}")]
    ReadFailed(String),
}

/// A source of foreground-switch gesture events.
#[async_trait]
pub trait GestureSource: Send {
    /// Block until the next gesture, or return an error if the device can
    /// no longer be read (the monitor loop logs and stops on error).
    async fn next_gesture(&mut self) -> Result<(), GestureSourceError>;
}

/// Reads raw bytes from a device node; any non-empty read counts as one
/// gesture. Good enough for a switch-style input device without decoding
/// its protocol, which is out of scope here.
pub struct DevInputGestureSource {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl DevInputGestureSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    #[allow(clippy::expect_used)]
    async fn ensure_open(&mut self) -> Result<&mut tokio::fs::File, GestureSourceError> {
        if self.file.is_none() {
            let file = tokio::fs::File::open(&self.path)
                .await
                .map_err(|e| GestureSourceError::OpenFailed { path: self.path.clone(), reason: e.to_string() })?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("just set"))
    }
}

#[async_trait]
impl GestureSource for DevInputGestureSource {
    async fn next_gesture(&mut self) -> Result<(), GestureSourceError> {
        let file = self.ensure_open().await?;
        let mut buf = [0u8; 64];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| GestureSourceError::ReadFailed(e.to_string()))?;
            if n == 0 {
                return Err(GestureSourceError::ReadFailed("device closed".to_string()));
            }
            return Ok(());
        }
    }
}

/// Runs the gesture-watch loop as a background task. Constructed
/// only when `ManagerConfig::input_config.enabled` is set.
pub struct InputMonitor {
    manager: Arc<ZonesManager>,
    cancel: CancellationToken,
}

impl InputMonitor {
    pub fn new(manager: Arc<ZonesManager>) -> Self {
        Self { manager, cancel: CancellationToken::new() }
    }

    /// Stop the monitor loop, if running.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Spawn the watch loop on `source`, rotating the manager's foreground
    /// zone (round-robin) on every gesture until `stop()` is called
    /// or the source errors out.
    pub fn spawn(&self, mut source: impl GestureSource + 'static) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            info!("input monitor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("input monitor stopping");
                        break;
                    }
                    gesture = source.next_gesture() => {
                        match gesture {
                            Ok(()) => manager.rotate_foreground().await,
                            Err(e) => {
                                warn!(error = %e, "input monitor device error, stopping");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::FakeContainerHandle;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use zn_core::{ManagerConfig, ZoneConfig};

    struct FakeGestureSource {
        rx: mpsc::UnboundedReceiver<()>,
    }

    #[async_trait]
    impl GestureSource for FakeGestureSource {
        async fn next_gesture(&mut self) -> Result<(), GestureSourceError> {
            self.rx.recv().await.ok_or_else(|| GestureSourceError::ReadFailed("closed".to_string()))
        }
    }

    async fn manager_with_two_zones() -> Arc<ZonesManager> {
        let config =
            ManagerConfig::for_test("z1", vec![ZoneConfig::for_test("z1", 1), ZoneConfig::for_test("z2", 2)])
                .unwrap();
        let factory = Arc::new(|_cfg: &ZoneConfig| FakeContainerHandle::new() as Arc<dyn crate::container::ContainerHandle>);
        let manager = ZonesManager::new(config, factory, false);
        manager.start_all().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn each_gesture_rotates_the_foreground_zone() {
        let manager = manager_with_two_zones().await;
        let first = manager.get_active_zone_id();

        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = InputMonitor::new(Arc::clone(&manager));
        let handle = monitor.spawn(FakeGestureSource { rx });

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = manager.get_active_zone_id();
        assert_ne!(first, second, "one gesture should move foreground to the other zone");

        monitor.stop();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn source_error_stops_the_loop_without_panicking() {
        let manager = manager_with_two_zones().await;
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);

        let monitor = InputMonitor::new(manager);
        let handle = monitor.spawn(FakeGestureSource { rx });
        let ran_to_completion = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(ran_to_completion.is_ok(), "monitor loop should exit on its own once the source errors");
    }

    #[tokio::test]
    async fn stop_halts_loop_even_without_a_gesture() {
        let manager = manager_with_two_zones().await;
        let (_tx, rx) = mpsc::unbounded_channel();

        let monitor = InputMonitor::new(manager);
        let handle = monitor.spawn(FakeGestureSource { rx });
        monitor.stop();
        let stopped = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(stopped.is_ok(), "stop() should end the loop promptly");
    }
}
