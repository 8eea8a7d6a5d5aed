// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The single error sum type used at every API boundary.

use thiserror::Error;

use crate::zone_id::ZoneId;

/// Domain error kinds shared by the manager, the zone state machine, the
/// proxy-call router, and the IPC service. Every fallible public operation
/// in this crate family returns `Result<_, Status>`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Status {
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("zone operation failed for {zone}: {reason}")]
    ZoneOperationError { zone: ZoneId, reason: String },

    #[error("proxy call denied by policy")]
    PolicyDenied,

    #[error("unknown zone id: {0}")]
    UnknownTarget(ZoneId),

    #[error("zone {0} is stopped")]
    TargetStopped(ZoneId),

    #[error("operation timed out")]
    Timeout,

    #[error("peer disconnected")]
    PeerGone,

    #[error("downstream error: {0}")]
    Forwarded(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("frame protocol violation: {0}")]
    Framing(String),

    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

impl Status {
    /// Map onto the wire-level result-code strings. Errors that have no
    /// dedicated wire constant (e.g. ones that never cross the bus, like
    /// `Framing`) fall back to `ERROR_FORWARDED`, matching how a downstream
    /// opaque error is represented.
    pub fn code(&self) -> &'static str {
        match self {
            Status::PolicyDenied => "ERROR_FORBIDDEN",
            Status::UnknownTarget(_) => "ERROR_UNKNOWN_ID",
            Status::TargetStopped(_) => "ERROR_CONTAINER_STOPPED",
            Status::Forwarded(_) => "ERROR_FORWARDED",
            _ => "ERROR_FORWARDED",
        }
    }
}

impl From<std::io::Error> for Status {
    fn from(e: std::io::Error) -> Self {
        Status::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for Status {
    fn from(e: serde_json::Error) -> Self {
        Status::ConfigError(e.to_string())
    }
}

/// Result codes for `FileMoveRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMoveResult {
    Succeeded,
    Failed,
    DestinationNotFound,
    WrongDestination,
    NoPermissionsSend,
    NoPermissionsReceive,
}

crate::simple_display! {
    FileMoveResult {
        Succeeded => "FILE_MOVE_SUCCEEDED",
        Failed => "FILE_MOVE_FAILED",
        DestinationNotFound => "FILE_MOVE_DESTINATION_NOT_FOUND",
        WrongDestination => "FILE_MOVE_WRONG_DESTINATION",
        NoPermissionsSend => "FILE_MOVE_NO_PERMISSIONS_SEND",
        NoPermissionsReceive => "FILE_MOVE_NO_PERMISSIONS_RECEIVE",
    }
}

impl FileMoveResult {
    /// The literal result-code string sent back over `FileMoveRequest`.
    pub fn as_code(self) -> &'static str {
        match self {
            FileMoveResult::Succeeded => "FILE_MOVE_SUCCEEDED",
            FileMoveResult::Failed => "FILE_MOVE_FAILED",
            FileMoveResult::DestinationNotFound => "FILE_MOVE_DESTINATION_NOT_FOUND",
            FileMoveResult::WrongDestination => "FILE_MOVE_WRONG_DESTINATION",
            FileMoveResult::NoPermissionsSend => "FILE_MOVE_NO_PERMISSIONS_SEND",
            FileMoveResult::NoPermissionsReceive => "FILE_MOVE_NO_PERMISSIONS_RECEIVE",
        }
    }
}
