// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Cross-Zone File Move: a six-step check-then-move with a
//! best-effort notification to the destination zone on success.

use std::path::Path;

use tracing::warn;
use zn_core::FileMoveResult;

use super::ZonesManager;

impl ZonesManager {
    /// `FileMoveRequest(src, dst, path)`: move `path` from `src`'s storage
    /// into `dst`'s, subject to both zones' permission regexes.
    ///
    /// 1. both ids must name known zones
    /// 2. `src == dst` is rejected as `WRONG_DESTINATION`
    /// 3. `src.permitted_to_send` must permit `path`
    /// 4. `dst.permitted_to_recv` must permit `path`
    /// 5. the move itself (rename, falling back to copy+remove across
    ///    devices)
    /// 6. on success, best-effort `Notification` to `dst`
    pub async fn file_move_request(&self, src: &str, dst: &str, path: &str) -> FileMoveResult {
        let src_zone = match self.zone(src) {
            Ok(z) => z,
            Err(_) => return FileMoveResult::DestinationNotFound,
        };
        let dst_zone = match self.zone(dst) {
            Ok(z) => z,
            Err(_) => return FileMoveResult::DestinationNotFound,
        };

        if src_zone.id() == dst_zone.id() {
            return FileMoveResult::WrongDestination;
        }

        if !src_zone.config.permitted_to_send.permits(path) {
            return FileMoveResult::NoPermissionsSend;
        }
        if !dst_zone.config.permitted_to_recv.permits(path) {
            return FileMoveResult::NoPermissionsReceive;
        }

        let src_path = src_zone.config.root_fs_path.join(path.trim_start_matches('/'));
        let dst_path = dst_zone.config.root_fs_path.join(path.trim_start_matches('/'));

        if let Err(e) = move_file(&src_path, &dst_path) {
            warn!(src, dst, path, error = %e, "file move failed");
            return FileMoveResult::Failed;
        }

        if let Err(e) = dst_zone.send_notification(src, path, "FILE_MOVE_SUCCEEDED").await {
            warn!(dst, error = %e, "file move succeeded but notification delivery failed");
        }

        FileMoveResult::Succeeded
    }
}

/// `rename` fails across filesystem boundaries (`EXDEV`); rather than
/// matching on that specific, platform-dependent error, fall back to
/// copy-then-remove whenever the rename doesn't succeed outright and let
/// the fallback's own error (if any) be the one reported.
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dst)?;
    std::fs::remove_file(src)
}
