//! FlowManager - flow lifecycle operations against switches
//!
//! Operations resolve the switch, build the OpenFlow message and hand it to
//! the controller. Nothing waits for a reply: the cache only changes when a
//! flow statistics reply for the switch arrives, correlated by its dpid.

use std::collections::HashMap;
use std::sync::Arc;

use openflow_types::{
    event_names, Dpid, InboundEvent, InboundMessage, OfMessage, OutboundEvent, StatsReply,
    StatsReplyBody, StatsRequest, SwitchConnection,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::controller::Controller;
use crate::error::{FlowMgrError, Result};
use crate::flow::{Flow, FlowCommand, FlowId};
use crate::flow_store::FlowStore;

/// Per-switch state of a paginated flow statistics reply.
#[derive(Debug)]
enum Pending {
    /// Fragments of the current cycle, awaiting the final reply.
    Collecting(Vec<Flow>),
    /// A new request went out mid-reply. The rest of the old reply, up to
    /// and including its final fragment, is dropped.
    Abandoned,
}

/// FlowManager installs, dumps, clears and deletes switch flows.
///
/// Flow statistics replies flagged with `OFPSF_REPLY_MORE` are buffered per
/// switch; the final fragment commits the whole table to the store in one
/// replace. Only a reply received from its first fragment to its last is
/// ever committed.
pub struct FlowManager<C> {
    /// Controller owning the switch connections
    controller: C,

    /// Cached switch flow tables
    store: Arc<FlowStore>,

    /// Paginated replies in progress
    pending: Mutex<HashMap<Dpid, Pending>>,
}

impl<C: Controller> FlowManager<C> {
    /// Creates a manager with an empty store.
    pub fn new(controller: C) -> Self {
        Self::with_store(controller, Arc::new(FlowStore::new()))
    }

    /// Creates a manager sharing an existing store.
    pub fn with_store(controller: C, store: Arc<FlowStore>) -> Self {
        Self {
            controller,
            store,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<FlowStore> {
        &self.store
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Datapath ids of the switches the controller currently knows.
    pub fn switches(&self) -> Vec<Dpid> {
        self.controller.switches()
    }

    /// Sends an ADD flow-mod for `flow` to the switch.
    ///
    /// The store is left untouched; the flow shows up after the next poll.
    #[instrument(skip(self, flow), fields(flow_id = %flow.id()))]
    pub fn install(&self, flow: &Flow, dpid: Dpid) -> Result<()> {
        let connection = self.resolve(&dpid)?;
        self.send_flow_mod(connection, flow, FlowCommand::Add);
        info!(dpid = %dpid, "Flow install sent");
        Ok(())
    }

    /// Sends a flow statistics request for every flow in every table.
    ///
    /// If an earlier reply is still arriving, its fragments are discarded
    /// and the remainder of that reply is ignored when it lands, so the
    /// store keeps its last complete table.
    #[instrument(skip(self))]
    pub fn request_dump(&self, dpid: Dpid) -> Result<()> {
        let connection = match self.resolve(&dpid) {
            Ok(connection) => connection,
            Err(e) => {
                self.pending.lock().remove(&dpid);
                return Err(e);
            }
        };

        let mut pending = self.pending.lock();
        let stale = match pending.get(&dpid) {
            Some(Pending::Collecting(flows)) => Some(flows.len()),
            _ => None,
        };
        if let Some(flows) = stale {
            warn!(
                dpid = %dpid,
                flows,
                "Abandoning incomplete flow statistics from previous cycle"
            );
            pending.insert(dpid, Pending::Abandoned);
        }
        drop(pending);

        self.emit(connection, OfMessage::StatsRequest(StatsRequest::all_flows()));
        debug!(dpid = %dpid, "Flow statistics requested");
        Ok(())
    }

    /// Sends a delete for every flow cached for the switch.
    ///
    /// Returns the number of deletes sent. Flows installed since the last
    /// poll are not in the cache and are left alone.
    #[instrument(skip(self))]
    pub fn clear(&self, dpid: Dpid) -> Result<usize> {
        let connection = self.resolve(&dpid)?;
        let flows = self.store.for_each_flow(&dpid, |_| true);

        for flow in &flows {
            self.send_flow_mod(connection.clone(), flow, FlowCommand::Delete);
        }

        info!(dpid = %dpid, deleted = flows.len(), "Flow table clear sent");
        Ok(flows.len())
    }

    /// Sends a delete for every cached flow of the switch with id `flow_id`.
    ///
    /// Returns the number of deletes sent; zero when nothing matched.
    #[instrument(skip(self))]
    pub fn delete_by_id(&self, flow_id: &FlowId, dpid: Dpid) -> Result<usize> {
        let connection = self.resolve(&dpid)?;
        let flows = self.store.for_each_flow(&dpid, |f| f.id() == flow_id);

        for flow in &flows {
            self.send_flow_mod(connection.clone(), flow, FlowCommand::Delete);
        }

        if flows.is_empty() {
            debug!(dpid = %dpid, "No cached flow with this id");
        } else {
            info!(dpid = %dpid, deleted = flows.len(), "Flow delete sent");
        }
        Ok(flows.len())
    }

    /// Requests a dump from every known switch.
    ///
    /// Switches are polled independently; a failure on one does not stop
    /// the others. Partial replies from switches no longer connected are
    /// dropped.
    pub fn dump_all(&self) -> Vec<(Dpid, Result<()>)> {
        let switches = self.controller.switches();
        self.pending
            .lock()
            .retain(|dpid, _| switches.contains(dpid));

        switches
            .into_iter()
            .map(|dpid| (dpid, self.request_dump(dpid)))
            .collect()
    }

    /// Handles an inbound event from the controller.
    ///
    /// Only flow statistics replies change state. Other statistics bodies
    /// and other events are ignored.
    pub fn on_statistics_reply(&self, event: &InboundEvent) {
        if event.name != event_names::IN_STATS_REPLY {
            debug!(event = %event.name, "Ignoring event");
            return;
        }

        let reply = match &event.message {
            InboundMessage::StatsReply(reply) => reply,
            InboundMessage::Other(kind) => {
                debug!(dpid = %event.switch, kind = %kind, "Ignoring non statistics message");
                return;
            }
        };

        self.handle_reply(event.switch, reply);
    }

    /// Number of flows buffered for `dpid` from fragments not yet committed.
    pub fn pending_fragments(&self, dpid: &Dpid) -> usize {
        match self.pending.lock().get(dpid) {
            Some(Pending::Collecting(flows)) => flows.len(),
            _ => 0,
        }
    }

    /// Processes inbound events until the subscription closes.
    pub async fn listen(&self, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        info!("Listening for flow statistics replies");
        while let Some(event) = events.recv().await {
            self.on_statistics_reply(&event);
        }
        info!("Inbound event subscription closed");
    }

    fn handle_reply(&self, dpid: Dpid, reply: &StatsReply) {
        let entries = match &reply.body {
            StatsReplyBody::Flow(entries) => entries,
            other => {
                let err = FlowMgrError::UnsupportedStatisticsBody {
                    body: other.stats_type(),
                };
                debug!(dpid = %dpid, "{}", err);
                return;
            }
        };

        let decoded: Vec<Flow> = entries.iter().map(Flow::from_statistics_entry).collect();

        let mut pending = self.pending.lock();

        if reply.has_more() {
            match pending
                .entry(dpid)
                .or_insert_with(|| Pending::Collecting(Vec::new()))
            {
                Pending::Collecting(buffered) => {
                    buffered.extend(decoded);
                    debug!(dpid = %dpid, buffered = buffered.len(), "Buffered flow statistics fragment");
                }
                Pending::Abandoned => {
                    debug!(dpid = %dpid, "Dropping fragment of abandoned reply");
                }
            }
            return;
        }

        let flows = match pending.remove(&dpid) {
            None => decoded,
            Some(Pending::Collecting(mut flows)) => {
                flows.extend(decoded);
                flows
            }
            Some(Pending::Abandoned) => {
                debug!(dpid = %dpid, "Abandoned reply complete, keeping cached table");
                return;
            }
        };
        drop(pending);

        info!(dpid = %dpid, flows = flows.len(), "Flow table updated");
        self.store.replace(dpid, flows);
    }

    fn resolve(&self, dpid: &Dpid) -> Result<SwitchConnection> {
        self.controller.connection(dpid).ok_or_else(|| {
            warn!(dpid = %dpid, "Switch not found");
            FlowMgrError::unknown_switch(*dpid)
        })
    }

    fn send_flow_mod(&self, connection: SwitchConnection, flow: &Flow, command: FlowCommand) {
        let flow_mod = flow.to_install_command(command);
        debug!(
            dpid = %connection.dpid,
            flow_id = %flow.id(),
            command = %flow_mod.command,
            "Sending flow-mod"
        );
        self.emit(connection, OfMessage::FlowMod(flow_mod));
    }

    fn emit(&self, destination: SwitchConnection, message: OfMessage) {
        self.controller.submit(OutboundEvent::new(destination, message));
    }
}
