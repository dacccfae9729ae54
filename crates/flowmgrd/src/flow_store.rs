//! Per-switch flow cache.
//!
//! The store maps a datapath id to the flows last reported by that switch.
//! Like `SyncMap` in the orchestration code, lookups never create entries:
//! a missing key means the switch has never been polled, which is not the
//! same as a switch whose table is empty.
//!
//! Each entry's flow list is an `Arc<[Flow]>` swapped in whole under the
//! write lock, so readers always hold a complete list from one poll cycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use openflow_types::Dpid;
use parking_lot::RwLock;
use serde::Serialize;

use crate::flow::Flow;

/// Snapshot of one switch's cached flow table.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchFlows {
    pub dpid: Dpid,
    /// When the reply that produced this list was committed.
    pub polled_at: DateTime<Utc>,
    pub flows: Arc<[Flow]>,
}

/// Cache of switch flow tables, keyed by datapath id.
#[derive(Debug, Default)]
pub struct FlowStore {
    entries: RwLock<HashMap<Dpid, SwitchFlows>>,
}

impl FlowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached list for `dpid`.
    ///
    /// The previous list is superseded, never merged.
    pub fn replace(&self, dpid: Dpid, flows: Vec<Flow>) {
        let entry = SwitchFlows {
            dpid,
            polled_at: Utc::now(),
            flows: flows.into(),
        };
        self.entries.write().insert(dpid, entry);
    }

    /// Returns the cached entry for `dpid`, or `None` if it was never polled.
    pub fn get(&self, dpid: &Dpid) -> Option<SwitchFlows> {
        self.entries.read().get(dpid).cloned()
    }

    /// Returns only the cached flow list for `dpid`.
    pub fn flows(&self, dpid: &Dpid) -> Option<Arc<[Flow]>> {
        self.entries.read().get(dpid).map(|e| Arc::clone(&e.flows))
    }

    /// Returns the time of the last committed reply for `dpid`.
    pub fn polled_at(&self, dpid: &Dpid) -> Option<DateTime<Utc>> {
        self.entries.read().get(dpid).map(|e| e.polled_at)
    }

    /// Point-in-time snapshot of every entry, ordered by datapath id.
    pub fn all_entries(&self) -> Vec<SwitchFlows> {
        let mut entries: Vec<SwitchFlows> = self.entries.read().values().cloned().collect();
        entries.sort_by_key(|e| e.dpid);
        entries
    }

    /// Returns the cached flows of `dpid` that satisfy `predicate`.
    ///
    /// The store is not modified; an unpolled switch yields no flows.
    pub fn for_each_flow<P>(&self, dpid: &Dpid, mut predicate: P) -> Vec<Flow>
    where
        P: FnMut(&Flow) -> bool,
    {
        match self.flows(dpid) {
            Some(flows) => flows.iter().filter(|f| predicate(f)).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Returns true if `dpid` has been polled at least once.
    pub fn contains(&self, dpid: &Dpid) -> bool {
        self.entries.read().contains_key(dpid)
    }

    /// Datapath ids with a cached entry, ordered.
    pub fn dpids(&self) -> Vec<Dpid> {
        let mut dpids: Vec<Dpid> = self.entries.read().keys().copied().collect();
        dpids.sort();
        dpids
    }

    /// Number of switches with a cached entry.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no switch has been polled yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
