// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The IPC Service's binary wire frame.
//!
//! ```text
//! message_id (u64 LE) | method_id (u32 LE) | kind (u8) | payload_len (u32 LE) | payload[payload_len]
//! ```

use crate::error::{ProtocolError, WireErrorCode};

/// Fixed header size in bytes: 8 + 4 + 1 + 4.
pub const HEADER_LEN: usize = 17;

/// A generous cap on a single frame's payload, well above any legitimate
/// zones-manager message, to keep a corrupt `payload_len` from causing an
/// unbounded allocation.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// The frame's `kind` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0,
    Response = 1,
    Signal = 2,
    Error = 3,
}

impl MessageKind {
    fn from_u8(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0 => Ok(Self::Request),
            1 => Ok(Self::Response),
            2 => Ok(Self::Signal),
            3 => Ok(Self::Error),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u64,
    pub method_id: u32,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn request(message_id: u64, method_id: u32, payload: Vec<u8>) -> Self {
        Self { message_id, method_id, kind: MessageKind::Request, payload }
    }

    pub fn response(message_id: u64, method_id: u32, payload: Vec<u8>) -> Self {
        Self { message_id, method_id, kind: MessageKind::Response, payload }
    }

    pub fn signal(method_id: u32, payload: Vec<u8>) -> Self {
        Self { message_id: 0, method_id, kind: MessageKind::Signal, payload }
    }

    /// An `ERROR` frame echoing the request's `message_id`, carrying the
    /// numeric code and reason as its payload.
    pub fn error(message_id: u64, method_id: u32, code: WireErrorCode, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.as_u16().to_le_bytes());
        payload.extend_from_slice(reason.as_bytes());
        Self { message_id, method_id, kind: MessageKind::Error, payload }
    }

    /// Decode an `ERROR` frame's payload back into `(code, reason)`. Only
    /// meaningful when `self.kind == MessageKind::Error`.
    pub fn error_payload(&self) -> Result<(WireErrorCode, String), ProtocolError> {
        if self.payload.len() < 2 {
            return Err(ProtocolError::TruncatedErrorPayload);
        }
        let (code_bytes, reason_bytes) = self.payload.split_at(2);
        let code = WireErrorCode::from_u16(u16::from_le_bytes([code_bytes[0], code_bytes[1]]));
        let reason = String::from_utf8(reason_bytes.to_vec())
            .map_err(|_| ProtocolError::InvalidErrorReason)?;
        Ok((code, reason))
    }
}

/// Encode a frame to its wire representation.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    buf.extend_from_slice(&frame.message_id.to_le_bytes());
    buf.extend_from_slice(&frame.method_id.to_le_bytes());
    buf.push(frame.kind as u8);
    buf.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&frame.payload);
    buf
}

/// Decode one frame from the front of `buf`, returning the frame and the
/// number of bytes consumed. Returns `ProtocolError::Incomplete` (not a
/// framing violation) when `buf` doesn't yet hold a complete frame — callers
/// should buffer more bytes and retry, per the Processor's read loop.
#[allow(clippy::expect_used)]
pub fn decode(buf: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::Incomplete { needed: HEADER_LEN, have: buf.len() });
    }

    let message_id = u64::from_le_bytes(buf[0..8].try_into().expect("slice is 8 bytes"));
    let method_id = u32::from_le_bytes(buf[8..12].try_into().expect("slice is 4 bytes"));
    let kind = MessageKind::from_u8(buf[12])?;
    let payload_len = u32::from_le_bytes(buf[13..17].try_into().expect("slice is 4 bytes"));

    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    let total_len = HEADER_LEN + payload_len as usize;
    if buf.len() < total_len {
        return Err(ProtocolError::Incomplete { needed: total_len, have: buf.len() });
    }

    let payload = buf[HEADER_LEN..total_len].to_vec();
    Ok((Frame { message_id, method_id, kind, payload }, total_len))
}
