//! Per-device adapter: one upstream connection, many client sessions.
//!
//! Message ids are remapped on the way upstream so responses can be routed
//! back to the issuing session with the client's original id, and so the
//! dialect's result hooks can be matched by the recorded method name.
//! Unsolicited events are broadcast to every attached session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use causeway_dialect::ProtocolAdapter;
use causeway_device::TargetId;
use causeway_protocol::{Frame, FrameKind};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::error::RelayError;
use crate::session::{ClientSession, SessionId};

/// Lifecycle events the owning collection reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// The upstream connection attempt failed. No retry is made here;
    /// retry policy belongs to the caller.
    ConnectFailed {
        /// The adapter that failed to connect.
        adapter_id: String,
        /// Why the dial failed.
        reason: String,
    },
    /// The upstream socket closed. The owning collection should evict
    /// this adapter.
    SocketClosed {
        /// The adapter whose socket closed.
        adapter_id: String,
    },
}

/// One client session plus its target binding and rewrite rules.
struct SessionBinding {
    session: ClientSession,
    target: TargetId,
    rules: ProtocolAdapter,
}

/// Bookkeeping for one in-flight request.
struct PendingReply {
    session: SessionId,
    client_id: i64,
    method: String,
}

/// Routing state shared with the upstream reader task.
#[derive(Default)]
struct RelayState {
    sessions: HashMap<SessionId, SessionBinding>,
    pending: HashMap<i64, PendingReply>,
    next_upstream_id: i64,
}

/// Manages the single upstream connection for one device and fans traffic
/// to its client sessions.
pub struct Adapter {
    id: String,
    upstream_url: String,
    targets: HashSet<TargetId>,
    state: Arc<Mutex<RelayState>>,
    upstream_tx: Option<mpsc::UnboundedSender<String>>,
    events: mpsc::UnboundedSender<AdapterEvent>,
    next_session_id: u64,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Adapter {
    /// Create an adapter for one forwarding-proxy endpoint.
    pub fn new(
        id: impl Into<String>,
        upstream_url: impl Into<String>,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Self {
        Self {
            id: id.into(),
            upstream_url: upstream_url.into(),
            targets: HashSet::new(),
            state: Arc::new(Mutex::new(RelayState::default())),
            upstream_tx: None,
            events,
            next_session_id: 1,
            tasks: Vec::new(),
        }
    }

    /// The adapter's id (collection-id/device-id).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The upstream endpoint this adapter dials.
    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Whether the upstream connection is live.
    pub fn is_started(&self) -> bool {
        self.upstream_tx.is_some()
    }

    /// Record that a target lives behind this adapter.
    pub fn register_target(&mut self, target: TargetId) {
        self.targets.insert(target);
    }

    /// Whether a target is known to this adapter.
    pub fn has_target(&self, target: TargetId) -> bool {
        self.targets.contains(&target)
    }

    /// Open the upstream connection.
    ///
    /// On failure a [`AdapterEvent::ConnectFailed`] is emitted and the error
    /// returned; no automatic retry. No timeout is imposed — the dial either
    /// completes or fails immediately.
    pub async fn start(&mut self) -> Result<(), RelayError> {
        let (ws, _) = match tokio_tungstenite::connect_async(self.upstream_url.as_str()).await {
            Ok(conn) => conn,
            Err(err) => {
                let _ = self.events.send(AdapterEvent::ConnectFailed {
                    adapter_id: self.id.clone(),
                    reason: err.to_string(),
                });
                return Err(RelayError::UpstreamConnect {
                    url: self.upstream_url.clone(),
                    reason: err.to_string(),
                });
            }
        };
        tracing::info!(adapter = %self.id, url = %self.upstream_url, "upstream connected");

        let (mut sink, mut stream) = ws.split();

        // Writer task: drains outbound frames into the socket in order.
        let (upstream_tx, mut upstream_rx) = mpsc::unbounded_channel::<String>();
        self.tasks.push(tokio::spawn(async move {
            while let Some(text) = upstream_rx.recv().await {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }));

        // Reader task: routes every upstream frame, then reports closure.
        let state = self.state.clone();
        let events = self.events.clone();
        let adapter_id = self.id.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_upstream(&state, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            tracing::info!(adapter = %adapter_id, "upstream socket closed");
            let _ = events.send(AdapterEvent::SocketClosed { adapter_id });
        }));

        self.upstream_tx = Some(upstream_tx);
        Ok(())
    }

    /// Attach an already-established upstream channel instead of dialing.
    /// Used by tests and in-process transports.
    pub fn attach_upstream(&mut self, upstream_tx: mpsc::UnboundedSender<String>) {
        self.upstream_tx = Some(upstream_tx);
    }

    /// Bind a new client session to a target behind this adapter.
    pub async fn connect_session(
        &mut self,
        target: TargetId,
        rules: ProtocolAdapter,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<SessionId, RelayError> {
        if !self.targets.contains(&target) {
            return Err(RelayError::TargetNotFound(target.to_string()));
        }
        let session_id = SessionId::new(self.next_session_id);
        self.next_session_id += 1;

        let mut state = self.state.lock().await;
        state.sessions.insert(
            session_id,
            SessionBinding {
                session: ClientSession::new(session_id, outbound),
                target,
                rules,
            },
        );
        tracing::debug!(adapter = %self.id, %session_id, %target, "session attached");
        Ok(session_id)
    }

    /// Release one session from the fan-out set.
    ///
    /// Other sessions and the upstream connection are unaffected.
    pub async fn detach_session(&mut self, session_id: SessionId) {
        let mut state = self.state.lock().await;
        state.sessions.remove(&session_id);
        state.pending.retain(|_, p| p.session != session_id);
        tracing::debug!(adapter = %self.id, %session_id, "session detached");
    }

    /// Number of attached sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Relay one frame from a client session upstream.
    ///
    /// Request ids are remapped so replies can be routed back; a frame that
    /// does not parse is dropped, never fatal to the session.
    pub async fn handle_client_frame(
        &self,
        session_id: SessionId,
        text: &str,
    ) -> Result<(), RelayError> {
        let upstream_tx = self
            .upstream_tx
            .as_ref()
            .ok_or_else(|| RelayError::NotStarted(self.id.clone()))?;

        let mut frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(adapter = %self.id, %session_id, %err, "dropping malformed client frame");
                return Ok(());
            }
        };

        if let (Ok(FrameKind::Request), Some(client_id), Some(method)) =
            (frame.kind(), frame.id, frame.method.clone())
        {
            let mut state = self.state.lock().await;
            if !state.sessions.contains_key(&session_id) {
                return Err(RelayError::SessionClosed);
            }
            let upstream_id = state.next_upstream_id + 1;
            state.next_upstream_id = upstream_id;
            state.pending.insert(
                upstream_id,
                PendingReply {
                    session: session_id,
                    client_id,
                    method,
                },
            );
            frame.id = Some(upstream_id);
        }

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(adapter = %self.id, %session_id, %err, "dropping unserializable frame");
                return Ok(());
            }
        };
        upstream_tx
            .send(text)
            .map_err(|_| RelayError::NotStarted(self.id.clone()))
    }

    /// Route one upstream frame. Exposed for tests and in-process
    /// transports; the reader task uses the same path.
    pub async fn process_upstream_text(&self, text: &str) {
        dispatch_upstream(&self.state, text).await;
    }

    /// Tear down the upstream connection and all relay tasks.
    pub async fn shutdown(&mut self) {
        self.upstream_tx = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let mut state = self.state.lock().await;
        state.sessions.clear();
        state.pending.clear();
        tracing::info!(adapter = %self.id, "adapter shut down");
    }
}

/// Route a frame arriving from the upstream socket.
///
/// Responses go to the issuing session with the client's original id
/// restored and the dialect's result hook applied; events fan out to every
/// session unmodified. A frame that fails to parse is dropped.
async fn dispatch_upstream(state: &Arc<Mutex<RelayState>>, text: &str) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(%err, "dropping malformed upstream frame");
            return;
        }
    };

    let mut state = state.lock().await;
    match frame.kind() {
        Ok(FrameKind::Response) => {
            let upstream_id = frame.id.unwrap_or_default();
            let Some(pending) = state.pending.remove(&upstream_id) else {
                tracing::warn!(upstream_id, "response for unknown request id");
                return;
            };
            let Some(binding) = state.sessions.get(&pending.session) else {
                tracing::debug!(session = %pending.session, "response for detached session");
                return;
            };
            let mut frame = frame;
            frame.id = Some(pending.client_id);
            let rewritten = binding.rules.apply_result_hook(&pending.method, frame);
            if binding.session.send(&rewritten).is_err() {
                tracing::debug!(session = %pending.session, "client channel closed");
            }
        }
        Ok(FrameKind::Event) | Ok(FrameKind::Request) => {
            // Unsolicited broadcast. Hooks rewrite response payloads only;
            // events reach every session untouched.
            for binding in state.sessions.values() {
                if binding.session.send(&frame).is_err() {
                    tracing::debug!(session = %binding.session.id(), "client channel closed");
                }
            }
        }
        Err(err) => {
            tracing::warn!(%err, "dropping unclassifiable upstream frame");
        }
    }
}
