// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Acceptor and per-peer connection handling for the IPC Service.
//!
//! Each accepted connection gets a reader task (this module) plus a writer
//! task fed by an unbounded channel, so a peer that reads slowly never
//! backs up another peer's delivery. A `CancellationToken` shared between
//! the two lets either side's failure tear down the other.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use zn_core::{PeerId, Status};
use zn_wire::{decode, encode, Frame, MessageKind, ProtocolError, WireErrorCode};

use super::{wire_error_to_status, Inner, Peer, SUBSCRIBE_METHOD_ID};

const READ_CHUNK: usize = 8 * 1024;

pub(crate) async fn accept_loop(inner: Arc<Inner>, listener: UnixListener) {
    loop {
        tokio::select! {
            _ = inner.accept_cancel.cancelled() => {
                debug!("ipc accept loop stopping");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let peer_id = inner.peer_ids.next();
                        let inner = Arc::clone(&inner);
                        tokio::spawn(async move {
                            handle_peer(inner, peer_id, stream).await;
                        });
                    }
                    Err(e) => error!(error = %e, "ipc accept error"),
                }
            }
        }
    }
}

async fn handle_peer(inner: Arc<Inner>, peer_id: PeerId, stream: UnixStream) {
    let (mut read_half, mut write_half) = stream.into_split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Frame>();
    let cancel = CancellationToken::new();

    {
        let mut state = inner.state.lock();
        state.peers.insert(peer_id, Peer { outbox: outbox_tx.clone(), cancel: cancel.clone() });
    }
    if let Some(cb) = inner.state.lock().new_peer_cb.clone() {
        cb(peer_id);
    }

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                frame = outbox_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if write_half.write_all(&encode(&frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut scratch = [0u8; READ_CHUNK];
    'read: loop {
        tokio::select! {
            _ = cancel.cancelled() => break 'read,
            read = read_half.read(&mut scratch) => {
                match read {
                    Ok(0) => break 'read,
                    Ok(n) => {
                        buf.extend_from_slice(&scratch[..n]);
                        if !drain_frames(&inner, peer_id, &mut buf, &outbox_tx) {
                            break 'read;
                        }
                    }
                    Err(e) => {
                        debug!(peer = %peer_id, error = %e, "ipc read error");
                        break 'read;
                    }
                }
            }
        }
    }

    cancel.cancel();
    let _ = writer.await;
    disconnect_peer(&inner, peer_id);
}

/// Decode as many complete frames as `buf` currently holds, dispatching
/// each. Returns `false` if a framing violation was found, at which point
/// the caller should drop the connection (unknown kinds and oversized
/// lengths are violations, a short buffer is not).
fn drain_frames(inner: &Arc<Inner>, peer_id: PeerId, buf: &mut Vec<u8>, outbox: &mpsc::UnboundedSender<Frame>) -> bool {
    loop {
        match decode(buf) {
            Ok((frame, consumed)) => {
                buf.drain(..consumed);
                dispatch_frame(inner, peer_id, frame, outbox);
            }
            Err(ProtocolError::Incomplete { .. }) => return true,
            Err(e) => {
                warn!(peer = %peer_id, error = %e, "ipc framing violation");
                return false;
            }
        }
    }
}

fn dispatch_frame(inner: &Arc<Inner>, peer_id: PeerId, frame: Frame, outbox: &mpsc::UnboundedSender<Frame>) {
    match frame.kind {
        MessageKind::Request => dispatch_request(inner, peer_id, frame, outbox.clone()),
        MessageKind::Signal => dispatch_signal(inner, peer_id, frame),
        MessageKind::Response => complete_pending(inner, peer_id, frame.message_id, Ok(frame.payload)),
        MessageKind::Error => {
            let status = match frame.error_payload() {
                Ok((code, reason)) => wire_error_to_status(code, reason),
                Err(_) => Status::Framing("malformed error frame".to_string()),
            };
            complete_pending(inner, peer_id, frame.message_id, Err(status));
        }
    }
}

fn dispatch_request(inner: &Arc<Inner>, peer_id: PeerId, frame: Frame, outbox: mpsc::UnboundedSender<Frame>) {
    let handler = inner.state.lock().method_handlers.get(&frame.method_id).cloned();
    let message_id = frame.message_id;
    let method_id = frame.method_id;

    let Some(handler) = handler else {
        let _ = outbox.send(Frame::error(
            message_id,
            method_id,
            WireErrorCode::Other,
            &format!("no handler registered for method {method_id}"),
        ));
        return;
    };

    tokio::spawn(async move {
        let reply = match tokio::spawn(handler(peer_id, frame.payload)).await {
            Ok(Ok(bytes)) => Frame::response(message_id, method_id, bytes),
            Ok(Err(status)) => Frame::error(message_id, method_id, WireErrorCode::HandlerError, &status.to_string()),
            Err(_join_error) => {
                Frame::error(message_id, method_id, WireErrorCode::HandlerError, "handler task panicked")
            }
        };
        let _ = outbox.send(reply);
    });
}

fn dispatch_signal(inner: &Arc<Inner>, peer_id: PeerId, frame: Frame) {
    if frame.method_id == SUBSCRIBE_METHOD_ID {
        if let Ok(bytes) = <[u8; 4]>::try_from(frame.payload.as_slice()) {
            let target = u32::from_le_bytes(bytes);
            inner.state.lock().subscribers.entry(target).or_default().insert(peer_id);
        }
        return;
    }

    let handler = inner.state.lock().signal_handlers.get(&frame.method_id).cloned();
    if let Some(handler) = handler {
        handler(peer_id, frame.payload);
    }
}

fn complete_pending(inner: &Arc<Inner>, peer_id: PeerId, message_id: u64, result: Result<Vec<u8>, Status>) {
    let waiter = inner.state.lock().pending.remove(&(peer_id, message_id));
    if let Some(tx) = waiter {
        let _ = tx.send(result);
    }
}

fn disconnect_peer(inner: &Arc<Inner>, peer_id: PeerId) {
    let mut state = inner.state.lock();
    state.peers.remove(&peer_id);
    for subscribers in state.subscribers.values_mut() {
        subscribers.remove(&peer_id);
    }

    let pending_keys: Vec<(PeerId, u64)> =
        state.pending.keys().filter(|(p, _)| *p == peer_id).copied().collect();
    for key in pending_keys {
        if let Some(tx) = state.pending.remove(&key) {
            let _ = tx.send(Err(Status::PeerGone));
        }
    }

    let removed_cb = state.removed_peer_cb.clone();
    drop(state);
    if let Some(cb) = removed_cb {
        cb(peer_id);
    }
}
