//! The target record: one debuggable context on a device or simulator.

use causeway_dialect::Dialect;
use tokio::sync::broadcast;

/// Unique identifier for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Create a target ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Whether a target lives on real hardware or a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Physical hardware attached over USB.
    Physical,
    /// A simulator runtime on the host.
    Simulator,
}

impl DeviceKind {
    /// Classify a raw discovery device id.
    ///
    /// Simulators report either the literal `SIMULATOR` id or a dashed
    /// UUID; physical devices report an undashed hardware identifier.
    pub fn from_device_id(device_id: &str) -> Self {
        if device_id.eq_ignore_ascii_case("simulator") || device_id.contains('-') {
            DeviceKind::Simulator
        } else {
            DeviceKind::Physical
        }
    }

    /// Whether this kind is a simulator.
    pub fn is_simulator(&self) -> bool {
        matches!(self, DeviceKind::Simulator)
    }
}

/// Connection state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No client has connected yet.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// At least one client session is attached.
    Connected,
    /// The target's socket closed permanently.
    Closed,
}

/// Emitted on every connection-state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    /// The target transitioned to a new connection state.
    StateChanged {
        /// Which target changed.
        target: TargetId,
        /// The new state.
        state: ConnectionState,
    },
}

/// Capacity of the per-target event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One discovered debuggable context.
///
/// Targets never hold a reference back to their owning adapter; the
/// collection keeps that link as an index.
#[derive(Debug)]
pub struct Target {
    id: TargetId,
    device_id: String,
    kind: DeviceKind,
    os_version: String,
    title: String,
    page_url: String,
    upstream_url: String,
    dialect: Option<Dialect>,
    needs_attach_handshake: bool,
    state: ConnectionState,
    events: broadcast::Sender<TargetEvent>,
}

impl Target {
    /// Create a target in the `Disconnected` state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TargetId,
        device_id: impl Into<String>,
        kind: DeviceKind,
        os_version: impl Into<String>,
        title: impl Into<String>,
        page_url: impl Into<String>,
        upstream_url: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id,
            device_id: device_id.into(),
            kind,
            os_version: os_version.into(),
            title: title.into(),
            page_url: page_url.into(),
            upstream_url: upstream_url.into(),
            dialect: None,
            needs_attach_handshake: false,
            state: ConnectionState::Disconnected,
            events,
        }
    }

    /// The target's id.
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// The id of the device this target lives on.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Physical or simulator.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// The OS version string the device reported (or the resolved fallback).
    pub fn os_version(&self) -> &str {
        &self.os_version
    }

    /// Page title from discovery.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Page URL from discovery.
    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// The forwarding-proxy socket endpoint to connect upstream to.
    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// The dialect resolved for this target, once bound.
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Record the dialect resolved on connection.
    pub fn set_dialect(&mut self, dialect: Dialect) {
        self.dialect = Some(dialect);
    }

    /// Whether this target needs an explicit attach handshake before
    /// debugging frames are valid.
    pub fn needs_attach_handshake(&self) -> bool {
        self.needs_attach_handshake
    }

    /// Apply the attach-handshake requirement determined at adapter
    /// construction.
    pub fn set_needs_attach_handshake(&mut self, required: bool) {
        self.needs_attach_handshake = required;
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transition to a new connection state, emitting an event.
    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        // No receivers is fine; nobody has subscribed yet.
        let _ = self.events.send(TargetEvent::StateChanged {
            target: self.id,
            state,
        });
    }

    /// Subscribe to connection-state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<TargetEvent> {
        self.events.subscribe()
    }
}
