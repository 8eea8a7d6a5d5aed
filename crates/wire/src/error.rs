// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Errors from the IPC wire codec and the numeric error codes carried in
//! `ERROR` frames.

use thiserror::Error;

/// Decode-time errors: either the buffer doesn't yet hold a full frame, or
/// the bytes it does hold don't form a well-formed one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not enough bytes buffered yet to decode a full frame. Not a framing
    /// violation — callers should read more and retry.
    #[error("incomplete frame: need {needed} bytes, have {have}")]
    Incomplete { needed: usize, have: usize },

    #[error("unknown message kind byte: {0}")]
    UnknownKind(u8),

    #[error("payload_len {0} exceeds the maximum frame size")]
    PayloadTooLarge(u32),

    #[error("error frame payload too short to hold a code")]
    TruncatedErrorPayload,

    #[error("error frame reason is not valid UTF-8")]
    InvalidErrorReason,
}

/// The numeric error code carried by an `ERROR` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum WireErrorCode {
    ServiceStopped = 1,
    PeerDisconnected = 2,
    TimedOut = 3,
    HandlerError = 4,
    Framing = 5,
    Other = 0xffff,
}

impl WireErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Self {
        match code {
            1 => Self::ServiceStopped,
            2 => Self::PeerDisconnected,
            3 => Self::TimedOut,
            4 => Self::HandlerError,
            5 => Self::Framing,
            _ => Self::Other,
        }
    }
}

zn_core::simple_display! {
    WireErrorCode {
        ServiceStopped => "SERVICE_STOPPED",
        PeerDisconnected => "PEER_DISCONNECTED",
        TimedOut => "TIMED_OUT",
        HandlerError => "HANDLER_ERROR",
        Framing => "FRAMING",
        Other => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        service_stopped = { WireErrorCode::ServiceStopped, 1, "SERVICE_STOPPED" },
        peer_disconnected = { WireErrorCode::PeerDisconnected, 2, "PEER_DISCONNECTED" },
        timed_out = { WireErrorCode::TimedOut, 3, "TIMED_OUT" },
        handler_error = { WireErrorCode::HandlerError, 4, "HANDLER_ERROR" },
        framing = { WireErrorCode::Framing, 5, "FRAMING" },
        other = { WireErrorCode::Other, 0xffff, "OTHER" },
    )]
    fn wire_error_code_round_trips_its_numeric_and_display_forms(code: WireErrorCode, numeric: u16, display: &str) {
        assert_eq!(code.as_u16(), numeric);
        assert_eq!(WireErrorCode::from_u16(numeric), code);
        assert_eq!(code.to_string(), display);
    }

    #[yare::parameterized(
        zero = { 0 },
        six = { 6 },
        max_minus_one = { 0xfffe },
    )]
    fn unrecognized_numeric_codes_fall_back_to_other(numeric: u16) {
        assert_eq!(WireErrorCode::from_u16(numeric), WireErrorCode::Other);
    }
}
