//! REST API for flow management
//!
//! [`RequestRouter`] maps the four management operations onto
//! [`FlowManager`], fanning out to every known switch when no dpid is
//! given. [`router`] mounts it on Axum.
//!
//! Routes:
//! - `GET /flows`, `GET /{dpid}/flows`
//! - `POST /flows`, `POST /{dpid}/flows`
//! - `DELETE /flows`, `DELETE /{dpid}/flows`
//! - `DELETE /flows/{flow_id}`, `DELETE /{dpid}/flows/{flow_id}`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use openflow_types::Dpid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::controller::Controller;
use crate::error::{FlowMgrError, Result};
use crate::flow::{Flow, FlowId};
use crate::flow_mgr::FlowManager;
use crate::flow_store::SwitchFlows;

/// JSON response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Success flag
    pub success: bool,
    /// Response data
    pub data: Option<T>,
    /// Error info if failed
    pub error: Option<ApiErrorResponse>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create error response
    pub fn error(error: ApiErrorResponse) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiErrorResponse {
    /// HTTP status code
    pub code: u16,
    /// Error message
    pub message: String,
    /// Optional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&FlowMgrError> for ApiErrorResponse {
    fn from(error: &FlowMgrError) -> Self {
        let status = match error {
            FlowMgrError::UnknownSwitch { .. } => StatusCode::NOT_FOUND,
            FlowMgrError::MalformedFlow { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::<()>::error(self))).into_response()
    }
}

/// Result of one switch's share of a management operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchOutcome {
    pub dpid: Dpid,
    pub success: bool,
    /// Flow-mods sent to this switch
    pub emitted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SwitchOutcome {
    fn from_result(dpid: Dpid, result: &Result<usize>) -> Self {
        match result {
            Ok(emitted) => Self {
                dpid,
                success: true,
                emitted: *emitted,
                error: None,
            },
            Err(e) => Self {
                dpid,
                success: false,
                emitted: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Translates management requests into flow manager calls.
pub struct RequestRouter<C> {
    manager: Arc<FlowManager<C>>,
}

impl<C: Controller> RequestRouter<C> {
    pub fn new(manager: Arc<FlowManager<C>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<FlowManager<C>> {
        &self.manager
    }

    /// Cached flow tables of one switch, or of every polled switch.
    ///
    /// A switch that has never been polled yields no entry.
    pub fn enumerate(&self, dpid: Option<Dpid>) -> Vec<SwitchFlows> {
        let store = self.manager.store();
        match dpid {
            Some(dpid) => store.get(&dpid).into_iter().collect(),
            None => store.all_entries(),
        }
    }

    /// Installs the described flow on one switch or on every known switch.
    ///
    /// The payload is validated first; a malformed flow is rejected before
    /// anything is sent.
    pub fn insert(&self, payload: &Value, dpid: Option<Dpid>) -> Result<Vec<SwitchOutcome>> {
        let flow = Flow::from_management_request(payload)?;
        Ok(self.fan_out("insert", dpid, |dpid| {
            self.manager.install(&flow, dpid).map(|()| 1)
        }))
    }

    /// Clears the cached flows of one switch or of every known switch.
    pub fn clear(&self, dpid: Option<Dpid>) -> Vec<SwitchOutcome> {
        self.fan_out("clear", dpid, |dpid| self.manager.clear(dpid))
    }

    /// Deletes the flows with `flow_id` from one switch or every known switch.
    pub fn delete(&self, flow_id: &FlowId, dpid: Option<Dpid>) -> Vec<SwitchOutcome> {
        self.fan_out("delete", dpid, |dpid| {
            self.manager.delete_by_id(flow_id, dpid)
        })
    }

    /// Runs `op` against each target in turn. Failures are recorded and the
    /// remaining targets are still attempted.
    fn fan_out<F>(&self, operation: &str, dpid: Option<Dpid>, mut op: F) -> Vec<SwitchOutcome>
    where
        F: FnMut(Dpid) -> Result<usize>,
    {
        let targets = match dpid {
            Some(dpid) => vec![dpid],
            None => self.manager.switches(),
        };

        targets
            .into_iter()
            .map(|dpid| {
                let result = op(dpid);
                if let Err(e) = &result {
                    warn!(operation, dpid = %dpid, error = %e, "Switch operation failed");
                }
                SwitchOutcome::from_result(dpid, &result)
            })
            .collect()
    }
}

type ApiState<C> = State<Arc<RequestRouter<C>>>;

/// Builds the Axum router for the flow API.
pub fn router<C: Controller + 'static>(api: Arc<RequestRouter<C>>) -> Router {
    Router::new()
        .route(
            "/flows",
            get(list_all_flows::<C>)
                .post(insert_all_flows::<C>)
                .delete(clear_all_flows::<C>),
        )
        .route("/flows/{flow_id}", delete(delete_flow_all::<C>))
        .route(
            "/{dpid}/flows",
            get(list_switch_flows::<C>)
                .post(insert_switch_flow::<C>)
                .delete(clear_switch_flows::<C>),
        )
        .route("/{dpid}/flows/{flow_id}", delete(delete_flow_switch::<C>))
        .with_state(api)
}

fn parse_dpid(raw: &str) -> std::result::Result<Dpid, ApiErrorResponse> {
    raw.parse().map_err(|e: openflow_types::ParseError| {
        ApiErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid datapath id").with_details(e.to_string())
    })
}

fn parse_body(
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Value, ApiErrorResponse> {
    body.map(|Json(value)| value).map_err(|e| {
        ApiErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid JSON body").with_details(e.body_text())
    })
}

/// Response for an operation addressed to a single switch: its failure is
/// the request's failure.
fn single_switch(outcomes: Vec<SwitchOutcome>) -> Response {
    match outcomes.first() {
        Some(SwitchOutcome {
            success: false,
            error,
            ..
        }) => ApiErrorResponse::new(
            StatusCode::NOT_FOUND,
            error.clone().unwrap_or_else(|| "Switch operation failed".to_string()),
        )
        .into_response(),
        _ => Json(ApiResponse::success(outcomes)).into_response(),
    }
}

async fn list_all_flows<C: Controller + 'static>(State(api): ApiState<C>) -> Response {
    Json(ApiResponse::success(api.enumerate(None))).into_response()
}

async fn list_switch_flows<C: Controller + 'static>(
    State(api): ApiState<C>,
    Path(dpid): Path<String>,
) -> Response {
    let dpid = match parse_dpid(&dpid) {
        Ok(dpid) => dpid,
        Err(e) => return e.into_response(),
    };

    match api.enumerate(Some(dpid)).pop() {
        Some(entry) => Json(ApiResponse::success(entry)).into_response(),
        None => ApiErrorResponse::new(
            StatusCode::NOT_FOUND,
            format!("No flows cached for {}", dpid),
        )
        .into_response(),
    }
}

async fn insert_all_flows<C: Controller + 'static>(
    State(api): ApiState<C>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };

    match api.insert(&payload, None) {
        Ok(outcomes) => {
            info!(switches = outcomes.len(), "Flow insert fanned out");
            Json(ApiResponse::success(outcomes)).into_response()
        }
        Err(e) => ApiErrorResponse::from(&e).into_response(),
    }
}

async fn insert_switch_flow<C: Controller + 'static>(
    State(api): ApiState<C>,
    Path(dpid): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let dpid = match parse_dpid(&dpid) {
        Ok(dpid) => dpid,
        Err(e) => return e.into_response(),
    };
    let payload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };

    match api.insert(&payload, Some(dpid)) {
        Ok(outcomes) => single_switch(outcomes),
        Err(e) => ApiErrorResponse::from(&e).into_response(),
    }
}

async fn clear_all_flows<C: Controller + 'static>(State(api): ApiState<C>) -> Response {
    Json(ApiResponse::success(api.clear(None))).into_response()
}

async fn clear_switch_flows<C: Controller + 'static>(
    State(api): ApiState<C>,
    Path(dpid): Path<String>,
) -> Response {
    match parse_dpid(&dpid) {
        Ok(dpid) => single_switch(api.clear(Some(dpid))),
        Err(e) => e.into_response(),
    }
}

async fn delete_flow_all<C: Controller + 'static>(
    State(api): ApiState<C>,
    Path(flow_id): Path<String>,
) -> Response {
    let flow_id = FlowId::from(flow_id);
    Json(ApiResponse::success(api.delete(&flow_id, None))).into_response()
}

async fn delete_flow_switch<C: Controller + 'static>(
    State(api): ApiState<C>,
    Path((dpid, flow_id)): Path<(String, String)>,
) -> Response {
    match parse_dpid(&dpid) {
        Ok(dpid) => single_switch(api.delete(&FlowId::from(flow_id), Some(dpid))),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LocalController;
    use openflow_types::{
        Action, FlowMatch, InboundEvent, OutboundEvent, PortNo, StatsReply, StatsReplyBody,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (
        Arc<RequestRouter<LocalController>>,
        mpsc::UnboundedReceiver<OutboundEvent>,
    ) {
        let (ctl, out) = LocalController::new();
        ctl.connect(Dpid::new(1));
        ctl.connect(Dpid::new(2));
        let manager = Arc::new(FlowManager::new(ctl));
        (Arc::new(RequestRouter::new(manager)), out)
    }

    fn payload() -> Value {
        json!({"match": {"in_port": 1}, "actions": [{"type": "output", "port": 2}]})
    }

    fn drain(out: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> usize {
        let mut n = 0;
        while out.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn test_api_response_envelope() {
        let ok = ApiResponse::success(vec![1, 2]);
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = ApiResponse::<()>::error(ApiErrorResponse::new(StatusCode::NOT_FOUND, "gone"));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "data": null, "error": {"code": 404, "message": "gone"}})
        );
    }

    #[test]
    fn test_error_status_mapping() {
        let unknown = ApiErrorResponse::from(&FlowMgrError::unknown_switch(Dpid::new(3)));
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let malformed = ApiErrorResponse::from(&FlowMgrError::malformed("bad"));
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let config = ApiErrorResponse::from(&FlowMgrError::Config("bad".into()));
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_insert_fans_out_to_every_switch() {
        let (api, mut out) = setup();
        let outcomes = api.insert(&payload(), None).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.success && o.emitted == 1));
        assert_eq!(drain(&mut out), 2);
    }

    #[test]
    fn test_malformed_insert_sends_nothing() {
        let (api, mut out) = setup();
        let err = api.insert(&json!({"actions": []}), None).unwrap_err();

        assert!(matches!(err, FlowMgrError::MalformedFlow { .. }));
        assert_eq!(drain(&mut out), 0);
    }

    #[test]
    fn test_fan_out_continues_past_failures() {
        let (api, mut out) = setup();
        let outcomes = api.insert(&payload(), Some(Dpid::new(9))).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("Unknown switch"));

        // Switch 1 fails; switch 2 is still attempted.
        let clear = api.fan_out("clear", None, |dpid| {
            if dpid == Dpid::new(1) {
                Err(FlowMgrError::unknown_switch(dpid))
            } else {
                api.manager().clear(dpid)
            }
        });
        assert_eq!(clear.len(), 2);
        assert!(!clear[0].success);
        assert!(clear[1].success);
        assert_eq!(drain(&mut out), 0);
    }

    #[test]
    fn test_enumerate_and_delete() {
        let (api, mut out) = setup();
        let flow = Flow::new(FlowMatch::all(), vec![Action::output(PortNo::FLOOD)]);
        let entry = openflow_types::FlowStats {
            table_id: 0,
            flow_match: FlowMatch::all(),
            duration_sec: 0,
            duration_nsec: 0,
            priority: flow.priority(),
            idle_timeout: 0,
            hard_timeout: 0,
            cookie: 0,
            packet_count: 0,
            byte_count: 0,
            actions: flow.actions().to_vec(),
        };
        api.manager().on_statistics_reply(&InboundEvent::stats_reply(
            Dpid::new(1),
            StatsReply::new(StatsReplyBody::Flow(vec![entry])),
        ));

        assert_eq!(api.enumerate(None).len(), 1);
        assert_eq!(api.enumerate(Some(Dpid::new(1)))[0].flows.len(), 1);
        assert!(api.enumerate(Some(Dpid::new(2))).is_empty());

        let outcomes = api.delete(flow.id(), None);
        let emitted: Vec<usize> = outcomes.iter().map(|o| o.emitted).collect();
        assert_eq!(emitted, vec![1, 0]);
        assert_eq!(drain(&mut out), 1);
    }

    #[tokio::test]
    async fn test_list_switch_flows_statuses() {
        let (api, _out) = setup();

        let resp = list_switch_flows(State(Arc::clone(&api)), Path("1".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = list_switch_flows(State(Arc::clone(&api)), Path("zz:top".to_string())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        api.manager().on_statistics_reply(&InboundEvent::stats_reply(
            Dpid::new(1),
            StatsReply::new(StatsReplyBody::Flow(vec![])),
        ));
        let resp = list_switch_flows(State(api), Path("1".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_insert_handlers() {
        let (api, mut out) = setup();

        let resp = insert_switch_flow(
            State(Arc::clone(&api)),
            Path("00:00:00:00:00:00:00:02".to_string()),
            Ok(Json(payload())),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = insert_switch_flow(
            State(Arc::clone(&api)),
            Path("7".to_string()),
            Ok(Json(payload())),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = insert_all_flows(State(api), Ok(Json(json!({"match": {}})))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(drain(&mut out), 1);
    }

    #[test]
    fn test_router_builds() {
        let (api, _out) = setup();
        let _ = router(api);
    }
}
