// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! IPC Service (C1): a Unix-domain-socket request/response/signal
//! multiplexer, built on the frame codec in `zn-wire`.
//!
//! An `Acceptor` (see [`connection::accept_loop`]) owns the listening
//! socket; each accepted peer gets its own reader task plus a writer task
//! fed by an `mpsc` channel, so one slow peer never blocks another's reads
//! or writes. Request/response pairing and signal subscriber bookkeeping
//! live in a single `Mutex`-protected [`State`]: a single owner for peer
//! tables and pending-reply tracking, even though the actual work happens
//! across many tokio tasks rather than one dedicated thread.

mod connection;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zn_core::{MessageIdGen, PeerId, PeerIdGen, Status};
use zn_wire::{Frame, WireErrorCode};

/// Reserved signal method id a peer sends to subscribe itself to future
/// broadcasts of another signal id: the payload is that id's `u32` LE
/// encoding. `signal()` only reaches peers that have sent this frame for
/// the id being broadcast.
pub const SUBSCRIBE_METHOD_ID: u32 = 0;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A request/response handler, dispatched on its own task per call so one
/// slow handler cannot stall reads from its peer or any other.
pub type MethodHandler = Arc<dyn Fn(PeerId, Vec<u8>) -> BoxFuture<Result<Vec<u8>, Status>> + Send + Sync>;

/// A fire-and-forget handler for inbound `Signal` frames (distinct from the
/// built-in subscribe frame, method id [`SUBSCRIBE_METHOD_ID`]).
pub type SignalHandler = Arc<dyn Fn(PeerId, Vec<u8>) + Send + Sync>;

pub type NewPeerCallback = Arc<dyn Fn(PeerId) + Send + Sync>;
pub type RemovedPeerCallback = Arc<dyn Fn(PeerId) + Send + Sync>;

/// Callback for `call_async`'s eventual result.
pub type AsyncResultCallback = Box<dyn FnOnce(Result<Vec<u8>, Status>) + Send>;

pub(crate) struct Peer {
    outbox: tokio::sync::mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
}

pub(crate) struct State {
    peers: HashMap<PeerId, Peer>,
    subscribers: HashMap<u32, HashSet<PeerId>>,
    method_handlers: HashMap<u32, MethodHandler>,
    signal_handlers: HashMap<u32, SignalHandler>,
    pending: HashMap<(PeerId, u64), oneshot::Sender<Result<Vec<u8>, Status>>>,
    new_peer_cb: Option<NewPeerCallback>,
    removed_peer_cb: Option<RemovedPeerCallback>,
    running: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            peers: HashMap::new(),
            subscribers: HashMap::new(),
            method_handlers: HashMap::new(),
            signal_handlers: HashMap::new(),
            pending: HashMap::new(),
            new_peer_cb: None,
            removed_peer_cb: None,
            running: false,
        }
    }
}

pub(crate) struct Inner {
    socket_path: PathBuf,
    state: Mutex<State>,
    peer_ids: PeerIdGen,
    message_ids: MessageIdGen,
    accept_cancel: CancellationToken,
}

/// Handle to one running (or not-yet-started) IPC Service. Cheap to clone —
/// every clone shares the same peer table and socket.
#[derive(Clone)]
pub struct IpcService(Arc<Inner>);

impl IpcService {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(Inner {
            socket_path: socket_path.into(),
            state: Mutex::new(State::default()),
            peer_ids: PeerIdGen::new(),
            message_ids: MessageIdGen::new(),
            accept_cancel: CancellationToken::new(),
        }))
    }

    /// Bind the socket and spawn the accept loop. Removes a stale socket
    /// file left behind by an unclean previous shutdown before binding.
    pub async fn start(&self) -> Result<(), Status> {
        if self.0.socket_path.exists() {
            std::fs::remove_file(&self.0.socket_path)?;
        }
        if let Some(parent) = self.0.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(&self.0.socket_path)?;
        self.0.state.lock().running = true;
        info!(path = %self.0.socket_path.display(), "ipc service listening");
        tokio::spawn(connection::accept_loop(Arc::clone(&self.0), listener));
        Ok(())
    }

    /// Stop accepting new peers, disconnect every current one, and fail
    /// every pending `call_sync`/`call_async` with `SERVICE_STOPPED`'s
    /// `Status` equivalent. Idempotent.
    pub fn stop(&self) {
        self.0.accept_cancel.cancel();

        let mut state = self.0.state.lock();
        state.running = false;

        let peer_ids: Vec<PeerId> = state.peers.keys().copied().collect();
        for id in peer_ids {
            if let Some(peer) = state.peers.remove(&id) {
                peer.cancel.cancel();
            }
            if let Some(cb) = state.removed_peer_cb.clone() {
                cb(id);
            }
        }
        state.subscribers.clear();

        for (_, tx) in state.pending.drain() {
            let _ = tx.send(Err(Status::Fatal("ipc service stopped".to_string())));
        }
        drop(state);

        let _ = std::fs::remove_file(&self.0.socket_path);
    }

    pub fn add_method_handler(&self, method_id: u32, handler: MethodHandler) {
        self.0.state.lock().method_handlers.insert(method_id, handler);
    }

    pub fn remove_method(&self, method_id: u32) {
        self.0.state.lock().method_handlers.remove(&method_id);
    }

    pub fn add_signal_handler(&self, method_id: u32, handler: SignalHandler) {
        self.0.state.lock().signal_handlers.insert(method_id, handler);
    }

    pub fn set_new_peer_callback(&self, cb: NewPeerCallback) {
        self.0.state.lock().new_peer_cb = Some(cb);
    }

    pub fn set_removed_peer_callback(&self, cb: RemovedPeerCallback) {
        self.0.state.lock().removed_peer_cb = Some(cb);
    }

    /// Send a `Request` frame to `peer` and await its `Response`/`Error`,
    /// failing with `Status::Timeout` if none arrives within `timeout`.
    pub async fn call_sync(
        &self,
        peer: PeerId,
        method_id: u32,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, Status> {
        let message_id = self.0.message_ids.next().as_u64();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.0.state.lock();
            if !state.running {
                return Err(Status::Fatal("ipc service is stopped".to_string()));
            }
            let Some(p) = state.peers.get(&peer) else {
                return Err(Status::PeerGone);
            };
            state.pending.insert((peer, message_id), tx);
            let _ = p.outbox.send(Frame::request(message_id, method_id, payload));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Status::PeerGone),
            Err(_) => {
                self.0.state.lock().pending.remove(&(peer, message_id));
                Err(Status::Timeout)
            }
        }
    }

    /// Like `call_sync` but returns immediately; `on_result` fires once the
    /// reply arrives or the peer disconnects. There is no caller-side
    /// timeout — a handler that never replies leaves the callback pending
    /// until the peer disconnects or the service stops.
    pub fn call_async(&self, peer: PeerId, method_id: u32, payload: Vec<u8>, on_result: AsyncResultCallback) {
        let message_id = self.0.message_ids.next().as_u64();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.0.state.lock();
            if !state.running {
                on_result(Err(Status::Fatal("ipc service is stopped".to_string())));
                return;
            }
            let Some(p) = state.peers.get(&peer) else {
                on_result(Err(Status::PeerGone));
                return;
            };
            state.pending.insert((peer, message_id), tx);
            let _ = p.outbox.send(Frame::request(message_id, method_id, payload));
        }

        tokio::spawn(async move {
            let result = rx.await.unwrap_or(Err(Status::PeerGone));
            on_result(result);
        });
    }

    /// Broadcast a `Signal` frame to every peer currently subscribed to
    /// `method_id`. A no-op if nobody has subscribed.
    pub fn signal(&self, method_id: u32, payload: Vec<u8>) {
        let state = self.0.state.lock();
        let Some(subscribed) = state.subscribers.get(&method_id) else { return };
        for peer_id in subscribed {
            if let Some(peer) = state.peers.get(peer_id) {
                let _ = peer.outbox.send(Frame::signal(method_id, payload.clone()));
            }
        }
    }
}

/// Map a wire-level error code and reason back onto the shared `Status`
/// type, so a peer on the other end of `call_sync` sees the same error
/// taxonomy as an in-process caller.
fn wire_error_to_status(code: WireErrorCode, reason: String) -> Status {
    match code {
        WireErrorCode::ServiceStopped => Status::Fatal(reason),
        WireErrorCode::PeerDisconnected => Status::PeerGone,
        WireErrorCode::TimedOut => Status::Timeout,
        WireErrorCode::HandlerError => Status::Forwarded(reason),
        WireErrorCode::Framing => Status::Framing(reason),
        WireErrorCode::Other => Status::Forwarded(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use serial_test::serial;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use zn_wire::{decode, encode, MessageKind};

    async fn raw_connect(path: &std::path::Path) -> UnixStream {
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(path).await {
                return s;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("could not connect to {}", path.display());
    }

    async fn read_one_frame(stream: &mut UnixStream) -> Frame {
        let mut buf = Vec::new();
        let mut scratch = [0u8; 256];
        loop {
            match decode(&buf) {
                Ok((frame, _)) => return frame,
                Err(zn_wire::ProtocolError::Incomplete { .. }) => {
                    let n = stream.read(&mut scratch).await.unwrap();
                    assert!(n > 0, "peer closed before sending a full frame");
                    buf.extend_from_slice(&scratch[..n]);
                }
                Err(e) => panic!("unexpected framing error: {e}"),
            }
        }
    }

    fn echo_handler() -> MethodHandler {
        Arc::new(|_peer, payload| Box::pin(async move { Ok(payload) }))
    }

    #[tokio::test]
    #[serial]
    async fn call_sync_round_trips_through_a_real_socket() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("ipc.sock");
        let service = IpcService::new(&socket);
        service.start().await.unwrap();

        let seen_peer = Arc::new(std::sync::OnceLock::new());
        {
            let seen_peer = Arc::clone(&seen_peer);
            service.set_new_peer_callback(Arc::new(move |id| {
                let _ = seen_peer.set(id);
            }));
        }

        let mut client = raw_connect(&socket).await;
        let request = Frame::request(1, 42, b"ping".to_vec());
        client.write_all(&encode(&request)).await.unwrap();

        let frame = read_one_frame(&mut client).await;
        assert_eq!(frame.kind, MessageKind::Error);
        let (code, _) = frame.error_payload().unwrap();
        assert_eq!(code, WireErrorCode::Other, "unregistered method is reported, not silently dropped");

        service.add_method_handler(42, echo_handler());

        let request = Frame::request(2, 42, b"hello".to_vec());
        client.write_all(&encode(&request)).await.unwrap();
        let reply = read_one_frame(&mut client).await;
        assert_eq!(reply.kind, MessageKind::Response);
        assert_eq!(reply.payload, b"hello");

        service.stop();
    }

    #[tokio::test]
    #[serial]
    async fn subscribed_peer_receives_signal_unsubscribed_does_not() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("ipc.sock");
        let service = IpcService::new(&socket);
        service.start().await.unwrap();

        let mut subscriber = raw_connect(&socket).await;
        let mut bystander = raw_connect(&socket).await;

        let subscribe = Frame::signal(SUBSCRIBE_METHOD_ID, 7u32.to_le_bytes().to_vec());
        subscriber.write_all(&encode(&subscribe)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        service.signal(7, b"state changed".to_vec());

        let signal = read_one_frame(&mut subscriber).await;
        assert_eq!(signal.kind, MessageKind::Signal);
        assert_eq!(signal.payload, b"state changed");

        drop(bystander);
        service.stop();
    }

    #[tokio::test]
    #[serial]
    async fn call_sync_times_out_when_peer_never_replies() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("ipc.sock");
        let service = IpcService::new(&socket);
        service.start().await.unwrap();

        let _client = raw_connect(&socket).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let peer_id = {
            let state = service.0.state.lock();
            *state.peers.keys().next().expect("one peer connected")
        };

        let err = service.call_sync(peer_id, 1, Vec::new(), Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, Status::Timeout);
    }

    #[tokio::test]
    #[serial]
    async fn call_sync_fails_fast_for_unknown_peer() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("ipc.sock");
        let service = IpcService::new(&socket);
        service.start().await.unwrap();

        let bogus_peer = {
            let gen = PeerIdGen::new();
            gen.next()
        };
        let err = service.call_sync(bogus_peer, 1, Vec::new(), Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, Status::PeerGone);
    }

    #[tokio::test]
    #[serial]
    async fn disconnect_removes_peer_and_fails_pending_calls() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("ipc.sock");
        let service = IpcService::new(&socket);
        service.start().await.unwrap();

        let removed = Arc::new(AtomicU32::new(0));
        {
            let removed = Arc::clone(&removed);
            service.set_removed_peer_callback(Arc::new(move |_id| {
                removed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let client = raw_connect(&socket).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert!(service.0.state.lock().peers.is_empty());
    }
}
