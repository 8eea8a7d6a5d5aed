// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! zn-wire: the binary frame codec spoken over the IPC Service's Unix
//! domain socket transport.
//!
//! The codec itself knows nothing about sockets or the method dispatch
//! table — it only turns bytes into `Frame`s and back. `zn-daemon`'s IPC
//! Acceptor/Processor own the actual `UnixListener`/`UnixStream` plumbing.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod error;
pub mod frame;

pub use error::{ProtocolError, WireErrorCode};
pub use frame::{decode, encode, Frame, MessageKind, HEADER_LEN, MAX_PAYLOAD_LEN};
