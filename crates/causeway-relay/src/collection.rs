//! Top-level registry: discovers targets, owns adapters, routes clients.
//!
//! Targets never hold a reference to the adapter that serves them; the
//! collection keeps an index from target id to adapter key instead, so
//! eviction is a pure map operation.

use std::collections::HashMap;

use causeway_device::{
    ConnectionState, DeviceKind, Discovery, RuntimeEnumerator, SimulatorVersionCache, Target,
    TargetId, FALLBACK_OS_VERSION,
};
use causeway_dialect::{resolve_dialect, ProtocolAdapter};
use tokio::sync::mpsc;

use crate::adapter::{Adapter, AdapterEvent};
use crate::error::RelayError;
use crate::session::SessionId;

/// Everything a caller needs to keep relaying for one accepted client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Key of the adapter serving this session.
    pub adapter_id: String,
    /// The session bound to the target.
    pub session: SessionId,
    /// The target the client attached to.
    pub target: TargetId,
    /// Whether the caller must perform the attach handshake before
    /// relaying client traffic.
    pub needs_attach_handshake: bool,
}

/// Owns all adapters and the target routing tables.
///
/// Adapters are keyed by `{collection-id}/{device-id}`; at most one adapter
/// exists per live device id, and rediscovering a known page is a no-op.
pub struct AdapterCollection<D: Discovery, E: RuntimeEnumerator> {
    id: String,
    discovery: D,
    enumerator: E,
    adapters: HashMap<String, Adapter>,
    targets: HashMap<TargetId, Target>,
    /// Page socket URL to target, for `connect_to` lookups.
    routes: HashMap<String, TargetId>,
    /// Target to owning adapter key. An index, not a reference.
    owner_index: HashMap<TargetId, String>,
    version_cache: SimulatorVersionCache,
    next_target_id: u64,
    events_tx: mpsc::UnboundedSender<AdapterEvent>,
    events_rx: mpsc::UnboundedReceiver<AdapterEvent>,
}

impl<D: Discovery, E: RuntimeEnumerator> AdapterCollection<D, E> {
    /// Create an empty collection around the two device collaborators.
    pub fn new(id: impl Into<String>, discovery: D, enumerator: E) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: id.into(),
            discovery,
            enumerator,
            adapters: HashMap::new(),
            targets: HashMap::new(),
            routes: HashMap::new(),
            owner_index: HashMap::new(),
            version_cache: SimulatorVersionCache::new(),
            next_target_id: 1,
            events_tx,
            events_rx,
        }
    }

    /// The collection id used to prefix adapter keys.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up a tracked target.
    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// All tracked targets.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Number of live adapters.
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// One discovery cycle.
    ///
    /// Each new raw record becomes a tracked target; a record whose page
    /// URL is already routed is left untouched, and a device id that
    /// already has an adapter gets no second one. A failed discovery call
    /// is an empty cycle: the current target list is returned unchanged.
    pub async fn get_targets(&mut self) -> Vec<TargetId> {
        let records = match self.discovery.list_targets().await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(collection = %self.id, %err, "discovery failed, keeping current targets");
                return self.targets.keys().copied().collect();
            }
        };

        for record in records {
            if self.routes.contains_key(&record.web_socket_debugger_url) {
                continue;
            }

            let kind = DeviceKind::from_device_id(&record.device_id);
            let os_version = match record.device_os_version {
                Some(version) if !version.is_empty() => version,
                _ if kind.is_simulator() => {
                    self.version_cache
                        .resolve(&record.device_id, &self.enumerator)
                        .await
                }
                _ => FALLBACK_OS_VERSION.to_string(),
            };

            let target_id = TargetId::new(self.next_target_id);
            self.next_target_id += 1;

            let adapter_key = format!("{}/{}", self.id, record.device_id);
            let adapter = self.adapters.entry(adapter_key.clone()).or_insert_with(|| {
                tracing::info!(adapter = %adapter_key, "tracking new device");
                Adapter::new(
                    adapter_key.clone(),
                    device_endpoint(&record.web_socket_debugger_url),
                    self.events_tx.clone(),
                )
            });
            adapter.register_target(target_id);

            self.targets.insert(
                target_id,
                Target::new(
                    target_id,
                    record.device_id,
                    kind,
                    os_version,
                    record.title.unwrap_or_default(),
                    record.url.unwrap_or_default(),
                    record.web_socket_debugger_url.clone(),
                ),
            );
            self.routes
                .insert(record.web_socket_debugger_url, target_id);
            self.owner_index.insert(target_id, adapter_key);
        }

        self.targets.keys().copied().collect()
    }

    /// Attach a client to the target behind a page socket URL.
    ///
    /// An unknown URL fails with a not-found error and tracks nothing. The
    /// first connection to a target resolves its dialect from the OS
    /// version and device kind; later connections reuse that resolution.
    pub async fn connect_to(
        &mut self,
        url: &str,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<ClientHandle, RelayError> {
        let target_id = *self
            .routes
            .get(url)
            .ok_or_else(|| RelayError::TargetNotFound(url.to_string()))?;

        let (rules, needs_attach) = {
            let target = self
                .targets
                .get_mut(&target_id)
                .ok_or_else(|| RelayError::TargetNotFound(url.to_string()))?;
            let dialect = match target.dialect() {
                Some(dialect) => dialect,
                None => {
                    let dialect =
                        resolve_dialect(target.os_version(), target.kind().is_simulator());
                    tracing::info!(
                        target = %target_id,
                        os_version = target.os_version(),
                        %dialect,
                        "dialect resolved"
                    );
                    target.set_dialect(dialect);
                    dialect
                }
            };
            let (rules, needs_attach) = ProtocolAdapter::for_dialect(dialect);
            target.set_needs_attach_handshake(needs_attach);
            target.set_state(ConnectionState::Connecting);
            (rules, needs_attach)
        };

        let adapter_key = self
            .owner_index
            .get(&target_id)
            .cloned()
            .ok_or_else(|| RelayError::TargetNotFound(url.to_string()))?;
        let adapter = self
            .adapters
            .get_mut(&adapter_key)
            .ok_or_else(|| RelayError::NotStarted(adapter_key.clone()))?;

        if !adapter.is_started() {
            if let Err(err) = adapter.start().await {
                if let Some(target) = self.targets.get_mut(&target_id) {
                    target.set_state(ConnectionState::Disconnected);
                }
                return Err(err);
            }
        }

        let session = adapter.connect_session(target_id, rules, outbound).await?;
        if let Some(target) = self.targets.get_mut(&target_id) {
            target.set_state(ConnectionState::Connected);
        }

        Ok(ClientHandle {
            adapter_id: adapter_key,
            session,
            target: target_id,
            needs_attach_handshake: needs_attach,
        })
    }

    /// Relay one client frame through the session's adapter.
    pub async fn relay_client_frame(
        &self,
        handle: &ClientHandle,
        text: &str,
    ) -> Result<(), RelayError> {
        let adapter = self
            .adapters
            .get(&handle.adapter_id)
            .ok_or_else(|| RelayError::NotStarted(handle.adapter_id.clone()))?;
        adapter.handle_client_frame(handle.session, text).await
    }

    /// Detach one client session. Other sessions on the same target and
    /// the upstream connection stay up.
    pub async fn disconnect(&mut self, handle: &ClientHandle) {
        if let Some(adapter) = self.adapters.get_mut(&handle.adapter_id) {
            adapter.detach_session(handle.session).await;
        }
    }

    /// Drain pending adapter lifecycle events, evicting adapters whose
    /// upstream socket closed.
    pub async fn process_adapter_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AdapterEvent::SocketClosed { adapter_id } => {
                    self.evict(&adapter_id).await;
                }
                AdapterEvent::ConnectFailed { adapter_id, reason } => {
                    tracing::warn!(adapter = %adapter_id, reason, "upstream connect failed");
                }
            }
        }
    }

    /// Remove an adapter and every target it served.
    pub async fn evict(&mut self, adapter_id: &str) {
        let Some(mut adapter) = self.adapters.remove(adapter_id) else {
            return;
        };
        adapter.shutdown().await;

        let owned: Vec<TargetId> = self
            .owner_index
            .iter()
            .filter(|(_, key)| key.as_str() == adapter_id)
            .map(|(target, _)| *target)
            .collect();
        for target_id in owned {
            self.owner_index.remove(&target_id);
            self.routes.retain(|_, routed| *routed != target_id);
            if let Some(mut target) = self.targets.remove(&target_id) {
                target.set_state(ConnectionState::Closed);
            }
        }
        tracing::info!(adapter = adapter_id, "adapter evicted");
    }

    /// Tear everything down.
    pub async fn shutdown(&mut self) {
        let keys: Vec<String> = self.adapters.keys().cloned().collect();
        for key in keys {
            self.evict(&key).await;
        }
    }

    #[cfg(test)]
    fn adapter_mut(&mut self, adapter_id: &str) -> Option<&mut Adapter> {
        self.adapters.get_mut(adapter_id)
    }
}

/// Derive the device-level proxy endpoint from a page socket URL.
///
/// The forwarding proxy exposes one locally forwarded port per device;
/// every page on the device shares that host:port and differs only in the
/// path. The adapter dials the device endpoint, not one page's socket.
fn device_endpoint(page_socket_url: &str) -> String {
    let Some(scheme_end) = page_socket_url.find("://") else {
        return page_socket_url.to_string();
    };
    let authority_start = scheme_end + 3;
    match page_socket_url[authority_start..].find('/') {
        Some(path_start) => page_socket_url[..authority_start + path_start].to_string(),
        None => page_socket_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use causeway_device::{DeviceError, RawTargetRecord};
    use causeway_dialect::Dialect;
    use causeway_protocol::Frame;

    struct FixedDiscovery {
        records: Vec<RawTargetRecord>,
        fail: bool,
    }

    impl FixedDiscovery {
        fn with(records: Vec<RawTargetRecord>) -> Self {
            Self {
                records,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: Vec::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Discovery for FixedDiscovery {
        async fn list_targets(&self) -> Result<Vec<RawTargetRecord>, DeviceError> {
            if self.fail {
                return Err(DeviceError::Discovery("connection refused".into()));
            }
            Ok(self.records.clone())
        }
    }

    struct FixedEnumerator {
        versions: HashMap<String, String>,
    }

    #[async_trait]
    impl RuntimeEnumerator for FixedEnumerator {
        async fn os_versions(&self) -> Result<HashMap<String, String>, DeviceError> {
            Ok(self.versions.clone())
        }
    }

    fn no_simulators() -> FixedEnumerator {
        FixedEnumerator {
            versions: HashMap::new(),
        }
    }

    fn record(device_id: &str, os_version: Option<&str>, ws_url: &str) -> RawTargetRecord {
        RawTargetRecord {
            device_id: device_id.to_string(),
            device_name: Some("test device".to_string()),
            device_os_version: os_version.map(str::to_string),
            url: Some("https://example.com/".to_string()),
            title: Some("Example".to_string()),
            web_socket_debugger_url: ws_url.to_string(),
        }
    }

    #[tokio::test]
    async fn collection_rediscovery_creates_no_duplicate_adapter() {
        let discovery = FixedDiscovery::with(vec![record(
            "deadbeef01",
            Some("12.2"),
            "ws://localhost:9222/devtools/page/1",
        )]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());

        let first = collection.get_targets().await;
        let second = collection.get_targets().await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first, second);
        assert_eq!(collection.adapter_count(), 1);
    }

    #[test]
    fn endpoint_derivation_strips_page_path() {
        assert_eq!(
            device_endpoint("ws://localhost:9222/devtools/page/1"),
            "ws://localhost:9222"
        );
        assert_eq!(device_endpoint("ws://localhost:9222"), "ws://localhost:9222");
        assert_eq!(device_endpoint("not-a-url"), "not-a-url");
    }

    #[tokio::test]
    async fn collection_two_pages_one_device_share_device_endpoint() {
        let discovery = FixedDiscovery::with(vec![
            record("deadbeef01", Some("16.1"), "ws://localhost:9222/devtools/page/1"),
            record("deadbeef01", Some("16.1"), "ws://localhost:9222/devtools/page/2"),
        ]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        let targets = collection.get_targets().await;
        assert_eq!(targets.len(), 2);
        assert_eq!(collection.adapter_count(), 1);

        // The shared adapter dials the device port, not page 1's socket.
        let adapter = collection.adapter_mut("default/deadbeef01").unwrap();
        assert_eq!(adapter.upstream_url(), "ws://localhost:9222");
        for target in targets {
            assert!(adapter.has_target(target));
        }
    }

    #[tokio::test]
    async fn collection_discovery_failure_keeps_current_targets() {
        let discovery = FixedDiscovery::with(vec![record(
            "deadbeef01",
            Some("12.2"),
            "ws://localhost:9222/devtools/page/1",
        )]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        let before = collection.get_targets().await;
        assert_eq!(before.len(), 1);

        collection.discovery = FixedDiscovery::failing();
        let after = collection.get_targets().await;
        assert_eq!(after.len(), 1);
        assert_eq!(collection.adapter_count(), 1);
    }

    #[tokio::test]
    async fn collection_unknown_url_is_not_found() {
        let mut collection =
            AdapterCollection::new("default", FixedDiscovery::with(vec![]), no_simulators());
        collection.get_targets().await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = collection
            .connect_to("ws://localhost:9222/devtools/page/404", tx)
            .await;
        assert!(matches!(result, Err(RelayError::TargetNotFound(_))));
        assert_eq!(collection.targets().count(), 0);
    }

    #[tokio::test]
    async fn collection_first_connect_resolves_dialect() {
        let ws_url = "ws://localhost:9222/devtools/page/1";
        let discovery = FixedDiscovery::with(vec![record("deadbeef01", Some("12.2"), ws_url)]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        let targets = collection.get_targets().await;
        let target_id = targets[0];

        // Pre-attach an upstream channel so no socket is dialed.
        let (upstream_tx, _upstream_rx) = mpsc::unbounded_channel();
        collection
            .adapter_mut("default/deadbeef01")
            .unwrap()
            .attach_upstream(upstream_tx);

        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = collection.connect_to(ws_url, tx).await.unwrap();

        let target = collection.target(target_id).unwrap();
        assert_eq!(target.dialect(), Some(Dialect::V12));
        assert!(target.needs_attach_handshake());
        assert!(handle.needs_attach_handshake);
        assert_eq!(target.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn collection_simulator_version_resolved_from_enumerator() {
        let ws_url = "ws://localhost:9222/devtools/page/1";
        // No OS version in the record; the id shape marks it a simulator.
        let discovery = FixedDiscovery::with(vec![record("SIM-AAAA-BBBB", None, ws_url)]);
        let enumerator = FixedEnumerator {
            versions: HashMap::from([("SIM-AAAA-BBBB".to_string(), "13.4".to_string())]),
        };
        let mut collection = AdapterCollection::new("default", discovery, enumerator);
        let targets = collection.get_targets().await;
        let target = collection.target(targets[0]).unwrap();
        assert_eq!(target.os_version(), "13.4");
        assert_eq!(target.kind(), DeviceKind::Simulator);
    }

    #[tokio::test]
    async fn collection_unknown_simulator_gets_fallback_version() {
        let ws_url = "ws://localhost:9222/devtools/page/1";
        let discovery = FixedDiscovery::with(vec![record("SIM-AAAA-BBBB", None, ws_url)]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        let targets = collection.get_targets().await;
        let target = collection.target(targets[0]).unwrap();
        assert_eq!(target.os_version(), FALLBACK_OS_VERSION);
    }

    #[tokio::test]
    async fn collection_second_session_shares_adapter() {
        let ws_url = "ws://localhost:9222/devtools/page/1";
        let discovery = FixedDiscovery::with(vec![record("deadbeef01", Some("16.1"), ws_url)]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        collection.get_targets().await;

        let (upstream_tx, mut upstream_rx) = mpsc::unbounded_channel();
        collection
            .adapter_mut("default/deadbeef01")
            .unwrap()
            .attach_upstream(upstream_tx);

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let handle_a = collection.connect_to(ws_url, tx_a).await.unwrap();
        let handle_b = collection.connect_to(ws_url, tx_b).await.unwrap();
        assert_eq!(handle_a.adapter_id, handle_b.adapter_id);
        assert_ne!(handle_a.session, handle_b.session);
        assert_eq!(collection.adapter_count(), 1);

        // Closing one session leaves the other relaying.
        collection.disconnect(&handle_b).await;
        collection
            .relay_client_frame(&handle_a, r#"{"id":1,"method":"Runtime.enable"}"#)
            .await
            .unwrap();
        let sent = Frame::parse(&upstream_rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent.method.as_deref(), Some("Runtime.enable"));
    }

    #[tokio::test]
    async fn collection_evicts_adapter_on_socket_closed() {
        let ws_url = "ws://localhost:9222/devtools/page/1";
        let discovery = FixedDiscovery::with(vec![record("deadbeef01", Some("16.1"), ws_url)]);
        let mut collection = AdapterCollection::new("default", discovery, no_simulators());
        let targets = collection.get_targets().await;
        assert_eq!(collection.adapter_count(), 1);

        collection
            .events_tx
            .send(AdapterEvent::SocketClosed {
                adapter_id: "default/deadbeef01".to_string(),
            })
            .unwrap();
        collection.process_adapter_events().await;

        assert_eq!(collection.adapter_count(), 0);
        assert!(collection.target(targets[0]).is_none());

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = collection.connect_to(ws_url, tx).await;
        assert!(matches!(result, Err(RelayError::TargetNotFound(_))));
    }
}
