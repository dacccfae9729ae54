//! Controller interface consumed by the flow manager.
//!
//! The controller owns switch connections. The flow manager borrows a
//! connection handle for a single operation, hands outbound events to the
//! controller's buffer and receives inbound events through a subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use openflow_types::{ConnectionId, Dpid, InboundEvent, OutboundEvent, SwitchConnection};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Operations the flow manager needs from the controller runtime.
pub trait Controller: Send + Sync {
    /// Resolves a datapath id to a live connection.
    fn connection(&self, dpid: &Dpid) -> Option<SwitchConnection>;

    /// Enqueues an outbound event. Buffering is the controller's concern.
    fn submit(&self, event: OutboundEvent);

    /// Datapath ids of the switches currently connected.
    fn switches(&self) -> Vec<Dpid>;
}

impl<C: Controller + ?Sized> Controller for Arc<C> {
    fn connection(&self, dpid: &Dpid) -> Option<SwitchConnection> {
        (**self).connection(dpid)
    }

    fn submit(&self, event: OutboundEvent) {
        (**self).submit(event)
    }

    fn switches(&self) -> Vec<Dpid> {
        (**self).switches()
    }
}

/// In-process controller.
///
/// Keeps a registry of connected switches, forwards submitted events to an
/// unbounded `msg_out` channel and routes delivered inbound events to every
/// subscriber of the event name.
pub struct LocalController {
    connections: RwLock<HashMap<Dpid, SwitchConnection>>,
    next_connection: AtomicU64,
    msg_out: mpsc::UnboundedSender<OutboundEvent>,
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<InboundEvent>>>>,
}

impl LocalController {
    /// Creates a controller and the receiving end of its outbound buffer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (msg_out, outbound) = mpsc::unbounded_channel();
        let controller = Self {
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
            msg_out,
            subscribers: RwLock::new(HashMap::new()),
        };
        (controller, outbound)
    }

    /// Registers a switch, returning its connection.
    ///
    /// A switch that is already connected keeps its existing connection.
    pub fn connect(&self, dpid: Dpid) -> SwitchConnection {
        let mut connections = self.connections.write();
        if let Some(existing) = connections.get(&dpid) {
            return existing.clone();
        }

        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let connection = SwitchConnection { id, dpid };
        connections.insert(dpid, connection.clone());
        info!(dpid = %dpid, connection = %id, "Switch connected");
        connection
    }

    /// Removes a switch from the registry. Returns false if it was unknown.
    pub fn disconnect(&self, dpid: &Dpid) -> bool {
        let removed = self.connections.write().remove(dpid).is_some();
        if removed {
            info!(dpid = %dpid, "Switch disconnected");
        }
        removed
    }

    /// Subscribes to inbound events named `name`.
    pub fn subscribe(&self, name: &str) -> mpsc::UnboundedReceiver<InboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .entry(name.to_string())
            .or_default()
            .push(tx);
        debug!(event = name, "Subscriber registered");
        rx
    }

    /// Delivers an inbound event to the subscribers of its name.
    ///
    /// Subscribers whose receiver was dropped are pruned. Returns the number
    /// of subscribers reached.
    pub fn deliver(&self, event: InboundEvent) -> usize {
        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(&event.name) else {
            debug!(event = %event.name, dpid = %event.switch, "No subscriber for event");
            return 0;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        senders.len()
    }
}

impl Controller for LocalController {
    fn connection(&self, dpid: &Dpid) -> Option<SwitchConnection> {
        self.connections.read().get(dpid).cloned()
    }

    fn submit(&self, event: OutboundEvent) {
        if let Err(e) = self.msg_out.send(event) {
            warn!(
                event = %e.0.name,
                dpid = %e.0.destination.dpid,
                "Outbound buffer closed, dropping event"
            );
        }
    }

    fn switches(&self) -> Vec<Dpid> {
        let mut dpids: Vec<Dpid> = self.connections.read().keys().copied().collect();
        dpids.sort();
        dpids
    }
}
