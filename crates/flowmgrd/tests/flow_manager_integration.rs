//! Flow manager integration tests
//!
//! Drives FlowManager, Poller and RequestRouter against an in-process
//! controller and a set of simulated switches that apply flow-mods to a
//! local table and answer flow statistics requests, paginating replies with
//! `OFPSF_REPLY_MORE`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use openflow_types::{
    event_names, Action, Dpid, FlowMatch, FlowMod, FlowModCommand, FlowStats, InboundEvent,
    OfMessage, OutboundEvent, PortNo, StatsReply, StatsReplyBody, StatsRequestBody,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use sonic_flowmgrd::{
    Flow, FlowId, FlowManager, FlowMgrError, LocalController, Poller, RequestRouter,
};
use tokio::sync::{mpsc, watch};

/// Simulated switches behind a LocalController.
struct Fabric {
    controller: Arc<LocalController>,
    outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    replies: mpsc::UnboundedReceiver<InboundEvent>,
    tables: HashMap<Dpid, Vec<FlowMod>>,
    /// Flow records per statistics reply
    page_size: usize,
    /// Every outbound event seen, in order
    log: Vec<OutboundEvent>,
}

impl Fabric {
    fn new(switches: &[u64]) -> (Self, Arc<FlowManager<Arc<LocalController>>>) {
        let (controller, outbound) = LocalController::new();
        for n in switches {
            controller.connect(Dpid::new(*n));
        }
        let replies = controller.subscribe(event_names::IN_STATS_REPLY);
        let controller = Arc::new(controller);
        let manager = Arc::new(FlowManager::new(Arc::clone(&controller)));

        let fabric = Self {
            controller,
            outbound,
            replies,
            tables: HashMap::new(),
            page_size: 2,
            log: Vec::new(),
        };
        (fabric, manager)
    }

    /// Applies every queued outbound event, then hands the switches'
    /// replies to the manager. Returns the number of outbound events.
    fn pump(&mut self, manager: &FlowManager<Arc<LocalController>>) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.outbound.try_recv() {
            self.apply(&event);
            self.log.push(event);
            handled += 1;
        }
        while let Ok(reply) = self.replies.try_recv() {
            manager.on_statistics_reply(&reply);
        }
        handled
    }

    fn apply(&mut self, event: &OutboundEvent) {
        let dpid = event.destination.dpid;
        match &event.message {
            OfMessage::FlowMod(fm) => {
                let table = self.tables.entry(dpid).or_default();
                table.retain(|f| !(f.flow_match == fm.flow_match && f.priority == fm.priority));
                if fm.command == FlowModCommand::Add {
                    table.push(fm.clone());
                }
            }
            OfMessage::StatsRequest(req) => {
                assert!(matches!(req.body, StatsRequestBody::Flow(_)));
                let records: Vec<FlowStats> = self
                    .tables
                    .get(&dpid)
                    .map(|t| t.iter().map(to_stats).collect())
                    .unwrap_or_default();

                let pages: Vec<Vec<FlowStats>> = if records.is_empty() {
                    vec![Vec::new()]
                } else {
                    records.chunks(self.page_size).map(<[FlowStats]>::to_vec).collect()
                };
                let last = pages.len() - 1;
                for (i, page) in pages.into_iter().enumerate() {
                    let body = StatsReplyBody::Flow(page);
                    let reply = if i < last {
                        StatsReply::fragment(body)
                    } else {
                        StatsReply::new(body)
                    };
                    self.controller.deliver(InboundEvent::stats_reply(dpid, reply));
                }
            }
        }
    }

    fn flow_mods(&self) -> Vec<(Dpid, FlowModCommand)> {
        self.log
            .iter()
            .filter_map(|e| match &e.message {
                OfMessage::FlowMod(fm) => Some((e.destination.dpid, fm.command)),
                OfMessage::StatsRequest(_) => None,
            })
            .collect()
    }
}

fn to_stats(fm: &FlowMod) -> FlowStats {
    FlowStats {
        table_id: 0,
        flow_match: fm.flow_match.clone(),
        duration_sec: 3,
        duration_nsec: 0,
        priority: fm.priority,
        idle_timeout: fm.idle_timeout,
        hard_timeout: fm.hard_timeout,
        cookie: fm.cookie,
        packet_count: 10,
        byte_count: 640,
        actions: fm.actions.clone(),
    }
}

fn flow_on_port(port: u16) -> Flow {
    Flow::new(
        FlowMatch {
            in_port: Some(PortNo::new(port).unwrap()),
            ..FlowMatch::all()
        },
        vec![Action::output(PortNo::NORMAL)],
    )
}

/// Installed flows come back from a poll with the same identity.
#[test]
fn test_install_then_poll_round_trip() {
    let (mut fabric, manager) = Fabric::new(&[1]);
    let d1 = Dpid::new(1);
    let payload = json!({
        "match": {"in_port": 3, "dl_type": 2048, "nw_src": "192.168.1.0/24", "nw_proto": 6, "tp_dst": 22},
        "actions": [{"type": "set_vlan_vid", "vlan_vid": 10}, {"type": "output", "port": 4}],
        "priority": 200,
        "idle_timeout": 60,
        "hard_timeout": 600,
        "cookie": 42
    });
    let flow = Flow::from_management_request(&payload).unwrap();

    manager.install(&flow, d1).unwrap();
    fabric.pump(&manager);
    assert!(manager.store().get(&d1).is_none());

    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);

    let cached = manager.store().flows(&d1).unwrap();
    assert_eq!(cached.len(), 1);
    let polled = &cached[0];
    assert_eq!(polled.id(), flow.id());
    assert_eq!(polled.flow_match(), flow.flow_match());
    assert_eq!(polled.actions(), flow.actions());
    assert_eq!(polled.priority(), 200);
    assert_eq!(polled.idle_timeout(), 60);
    assert_eq!(polled.hard_timeout(), 600);
    assert_eq!(polled.cookie(), 42);
    assert_eq!(polled.counters().unwrap().packet_count, 10);
}

/// A paginated table is committed whole, and a later poll supersedes it.
#[test]
fn test_paginated_reply_then_replacement() {
    let (mut fabric, manager) = Fabric::new(&[1]);
    let d1 = Dpid::new(1);

    for port in 1..=5 {
        manager.install(&flow_on_port(port), d1).unwrap();
    }
    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);
    assert_eq!(manager.store().flows(&d1).unwrap().len(), 5);
    assert_eq!(manager.pending_fragments(&d1), 0);

    manager.delete_by_id(flow_on_port(1).id(), d1).unwrap();
    manager.delete_by_id(flow_on_port(2).id(), d1).unwrap();
    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);

    let ids: Vec<FlowId> = manager
        .store()
        .flows(&d1)
        .unwrap()
        .iter()
        .map(|f| f.id().clone())
        .collect();
    let expected: Vec<FlowId> = (3..=5).map(|p| flow_on_port(p).id().clone()).collect();
    assert_eq!(ids, expected);
}

/// Clear sends one delete per cached flow and misses flows not yet polled.
#[test]
fn test_clear_uses_cached_view() {
    let (mut fabric, manager) = Fabric::new(&[1]);
    let d1 = Dpid::new(1);

    assert_eq!(manager.clear(d1).unwrap(), 0);

    manager.install(&flow_on_port(1), d1).unwrap();
    manager.install(&flow_on_port(2), d1).unwrap();
    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);

    manager.install(&flow_on_port(3), d1).unwrap();
    assert_eq!(manager.clear(d1).unwrap(), 2);
    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);

    let remaining = manager.store().flows(&d1).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), flow_on_port(3).id());

    let deletes = fabric
        .flow_mods()
        .into_iter()
        .filter(|(_, cmd)| cmd.is_delete())
        .count();
    assert_eq!(deletes, 2);
}

/// Unknown switches fail without sending anything.
#[test]
fn test_unknown_switch_emits_nothing() {
    let (mut fabric, manager) = Fabric::new(&[1]);
    let d9 = Dpid::new(9);

    assert!(matches!(
        manager.request_dump(d9),
        Err(FlowMgrError::UnknownSwitch { dpid }) if dpid == d9
    ));
    assert!(manager.install(&flow_on_port(1), d9).is_err());
    assert_eq!(fabric.pump(&manager), 0);
}

/// A switch that disconnects keeps its cache entry but rejects operations.
#[test]
fn test_disconnected_switch_keeps_cache() {
    let (mut fabric, manager) = Fabric::new(&[1]);
    let d1 = Dpid::new(1);

    manager.install(&flow_on_port(1), d1).unwrap();
    manager.request_dump(d1).unwrap();
    fabric.pump(&manager);

    fabric.controller.disconnect(&d1);
    assert!(manager.clear(d1).unwrap_err().is_retryable());
    assert_eq!(manager.store().flows(&d1).unwrap().len(), 1);
}

/// Fan-out through the request router reaches every known switch.
#[test]
fn test_router_fan_out() {
    let (mut fabric, manager) = Fabric::new(&[1, 2, 3]);
    let api = RequestRouter::new(Arc::clone(&manager));
    let payload = json!({"match": {"dl_type": 2054}, "actions": [{"type": "output", "port": "flood"}]});

    let outcomes = api.insert(&payload, None).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.success));

    manager.dump_all();
    fabric.pump(&manager);
    let flow_id = Flow::from_management_request(&payload).unwrap().id().clone();
    let entries = api.enumerate(None);
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.flows.len() == 1 && e.flows[0].id() == &flow_id));

    let outcomes = api.delete(&flow_id, Some(Dpid::new(2)));
    assert_eq!(outcomes[0].emitted, 1);
    let outcomes = api.clear(None);
    let emitted: Vec<usize> = outcomes.iter().map(|o| o.emitted).collect();
    assert_eq!(emitted, vec![1, 1, 1]);
    fabric.pump(&manager);

    let mods = fabric.flow_mods();
    let adds = mods.iter().filter(|(_, c)| *c == FlowModCommand::Add).count();
    assert_eq!(adds, 3);
    assert_eq!(mods.len(), 3 + 1 + 3);
}

/// The poller requests statistics from every switch on each period and the
/// listener commits the replies.
#[tokio::test(start_paused = true)]
async fn test_poller_and_listener() {
    let (controller, mut outbound) = LocalController::new();
    controller.connect(Dpid::new(1));
    controller.connect(Dpid::new(2));
    let replies = controller.subscribe(event_names::IN_STATS_REPLY);
    let controller = Arc::new(controller);
    let manager = Arc::new(FlowManager::new(Arc::clone(&controller)));

    let listener = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.listen(replies).await })
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(Arc::clone(&manager), Duration::from_secs(10)).spawn(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(1)).await;
    let mut requested = Vec::new();
    while let Ok(event) = outbound.try_recv() {
        assert_eq!(event.name, event_names::OUT_STATS_REQUEST);
        requested.push(event.destination.dpid);
    }
    requested.sort();
    assert_eq!(requested, vec![Dpid::new(1), Dpid::new(2)]);

    for dpid in requested {
        controller.deliver(InboundEvent::stats_reply(
            dpid,
            StatsReply::new(StatsReplyBody::Flow(vec![])),
        ));
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(manager.store().dpids(), vec![Dpid::new(1), Dpid::new(2)]);
    assert!(manager.store().flows(&Dpid::new(1)).unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    let mut second_cycle = 0;
    while outbound.try_recv().is_ok() {
        second_cycle += 1;
    }
    assert_eq!(second_cycle, 2);

    shutdown_tx.send(true).unwrap();
    poller.await.unwrap();
    listener.abort();
}
