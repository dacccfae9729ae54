//! # flowmgrd - OpenFlow Flow Table Manager
//!
//! Installs, enumerates, clears and deletes flows on OpenFlow 1.0 switches
//! and keeps a per-switch cache of their flow tables, rebuilt from
//! periodically polled flow statistics.
//!
//! ## Components
//! - [`Flow`]: immutable forwarding rule, built from a management request
//!   or a flow statistics record
//! - [`FlowStore`]: per-switch flow cache with whole-list replacement
//! - [`FlowManager`]: emits flow-mods and statistics requests, commits
//!   statistics replies to the store
//! - [`Poller`]: periodic statistics requests to every known switch
//! - [`RequestRouter`]: management operations with "all switches" fan-out,
//!   exposed over HTTP by [`rest_api::router`]
//!
//! ## Message flow
//! - Outbound: flow-mod and statistics request events to the controller
//! - Inbound: `of_core.messages.in.ofpt_stats_reply`, correlated by dpid
//!
//! The cache converges on switch state only through polling; a flow that was
//! just installed is not visible until the next reply for its switch.

pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod flow_mgr;
pub mod flow_store;
pub mod poller;
pub mod rest_api;

pub use config::FlowMgrConfig;
pub use controller::{Controller, LocalController};
pub use error::{FlowMgrError, Result};
pub use flow::{Flow, FlowCommand, FlowCounters, FlowId};
pub use flow_mgr::FlowManager;
pub use flow_store::{FlowStore, SwitchFlows};
pub use poller::{PollSummary, Poller, DEFAULT_POLL_INTERVAL};
pub use rest_api::{ApiErrorResponse, ApiResponse, RequestRouter, SwitchOutcome};
