//! In-process fake of a chromedriver-compatible engine: the root health
//! and shutdown endpoints the supervisor talks to, plus enough of the W3C
//! wire protocol under `/wd/hub` to drive sessions against a scripted
//! fixture DOM.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde_json::{json, Value};

use drover::{Drover, SessionOptions};

pub struct EngineState {
    pub status_code: u16,
    pub status_hits: u32,
    pub shutdown_hits: u32,
    pub ready: bool,
    pub fail_navigation: bool,
    pub matches: HashMap<String, Vec<String>>,
    pub invalid: Vec<String>,
    pub attributes: HashMap<String, HashMap<String, String>>,
    pub texts: HashMap<String, String>,
    pub text_failures: Vec<String>,
    pub stale: Vec<String>,
    pub next_session: u32,
    pub deletes: HashMap<String, u32>,
    pub clicks: Vec<String>,
    pub scripts: Vec<String>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status_code: 200,
            status_hits: 0,
            shutdown_hits: 0,
            ready: true,
            fail_navigation: false,
            matches: HashMap::new(),
            invalid: Vec::new(),
            attributes: HashMap::new(),
            texts: HashMap::new(),
            text_failures: Vec::new(),
            stale: Vec::new(),
            next_session: 0,
            deletes: HashMap::new(),
            clicks: Vec::new(),
            scripts: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub async fn spawn() -> (SocketAddr, FakeEngine) {
        let engine = FakeEngine {
            state: Arc::new(Mutex::new(EngineState::default())),
        };
        let app = Router::new()
            .route("/status", get(root_status))
            .route("/shutdown", get(engine_shutdown))
            .route("/wd/hub/status", get(hub_status))
            .route("/wd/hub/session", post(create_session))
            .route("/wd/hub/session/:sid", delete(delete_session))
            .route("/wd/hub/session/:sid/timeouts", post(ok_null))
            .route("/wd/hub/session/:sid/url", post(navigate))
            .route("/wd/hub/session/:sid/element", post(find_from_root))
            .route("/wd/hub/session/:sid/elements", post(find_all_from_root))
            .route("/wd/hub/session/:sid/execute/sync", post(execute_sync))
            .route(
                "/wd/hub/session/:sid/element/:eid/element",
                post(find_from_element),
            )
            .route(
                "/wd/hub/session/:sid/element/:eid/elements",
                post(find_all_from_element),
            )
            .route(
                "/wd/hub/session/:sid/element/:eid/attribute/:name",
                get(element_attribute),
            )
            .route("/wd/hub/session/:sid/element/:eid/text", get(element_text))
            .route(
                "/wd/hub/session/:sid/element/:eid/displayed",
                get(element_displayed),
            )
            .route(
                "/wd/hub/session/:sid/element/:eid/click",
                post(element_click),
            )
            .fallback(unknown_command)
            .with_state(engine.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (addr, engine)
    }

    pub fn add_match(&self, xpath: &str, ids: &[&str]) {
        self.state.lock().unwrap().matches.insert(
            xpath.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn remove_match(&self, xpath: &str) {
        self.state.lock().unwrap().matches.remove(xpath);
    }

    pub fn set_attribute(&self, eid: &str, name: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .attributes
            .entry(eid.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    pub fn set_text(&self, eid: &str, text: &str) {
        self.state
            .lock()
            .unwrap()
            .texts
            .insert(eid.to_string(), text.to_string());
    }

    pub fn fail_text(&self, eid: &str) {
        self.state.lock().unwrap().text_failures.push(eid.to_string());
    }

    pub fn mark_stale(&self, eid: &str) {
        self.state.lock().unwrap().stale.push(eid.to_string());
    }

    pub fn mark_invalid(&self, xpath: &str) {
        self.state.lock().unwrap().invalid.push(xpath.to_string());
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    pub fn set_fail_navigation(&self, fail: bool) {
        self.state.lock().unwrap().fail_navigation = fail;
    }

    pub fn status_hits(&self) -> u32 {
        self.state.lock().unwrap().status_hits
    }

    pub fn shutdown_hits(&self) -> u32 {
        self.state.lock().unwrap().shutdown_hits
    }

    pub fn delete_count(&self, sid: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .deletes
            .get(sid)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_deletes(&self) -> u32 {
        self.state.lock().unwrap().deletes.values().sum()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }
}

/// Spins up a fake engine and a context that has adopted it.
pub async fn adopted_context() -> (Drover, FakeEngine) {
    let (addr, engine) = FakeEngine::spawn().await;
    std::env::set_var("CHROME_DRIVER", "fake-driver-binary");
    let drover = Drover::new();
    drover.initialize(addr.port(), false).await.unwrap();
    (drover, engine)
}

pub fn quick_options(timeout_secs: u64) -> SessionOptions {
    SessionOptions {
        timeout: Duration::from_secs(timeout_secs),
        ..Default::default()
    }
}

fn value_ok(value: Value) -> Response {
    Json(json!({ "value": value })).into_response()
}

fn wire_error(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "value": {"error": error, "message": message, "stacktrace": ""}
        })),
    )
        .into_response()
}

async fn root_status(State(engine): State<FakeEngine>) -> Response {
    let mut state = engine.state.lock().unwrap();
    state.status_hits += 1;
    StatusCode::from_u16(state.status_code).unwrap().into_response()
}

async fn engine_shutdown(State(engine): State<FakeEngine>) -> Response {
    engine.state.lock().unwrap().shutdown_hits += 1;
    value_ok(Value::Null)
}

async fn hub_status(State(engine): State<FakeEngine>) -> Response {
    let ready = engine.state.lock().unwrap().ready;
    value_ok(json!({"ready": ready, "message": "ok"}))
}

async fn create_session(State(engine): State<FakeEngine>) -> Response {
    let mut state = engine.state.lock().unwrap();
    state.next_session += 1;
    let id = format!("sess-{}", state.next_session);
    value_ok(json!({"sessionId": id, "capabilities": {"browserName": "chrome"}}))
}

async fn delete_session(State(engine): State<FakeEngine>, Path(sid): Path<String>) -> Response {
    *engine
        .state
        .lock()
        .unwrap()
        .deletes
        .entry(sid)
        .or_insert(0) += 1;
    value_ok(Value::Null)
}

async fn ok_null() -> Response {
    value_ok(Value::Null)
}

async fn navigate(State(engine): State<FakeEngine>, Path(_sid): Path<String>) -> Response {
    if engine.state.lock().unwrap().fail_navigation {
        return wire_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unknown error",
            "unknown error: navigation refused".to_string(),
        );
    }
    value_ok(Value::Null)
}

fn respond_find(engine: &FakeEngine, xpath: &str, all: bool) -> Response {
    let state = engine.state.lock().unwrap();
    if state.invalid.iter().any(|p| p == xpath) {
        return wire_error(
            StatusCode::BAD_REQUEST,
            "invalid selector",
            format!("invalid selector: unable to parse {xpath}"),
        );
    }
    let ids = state.matches.get(xpath).cloned().unwrap_or_default();
    if all {
        let refs: Vec<Value> = ids
            .iter()
            .map(|id| json!({"element-6066-11e4-a52e-4f735466cecf": id}))
            .collect();
        return value_ok(Value::Array(refs));
    }
    match ids.first() {
        Some(id) => value_ok(json!({"element-6066-11e4-a52e-4f735466cecf": id})),
        None => wire_error(
            StatusCode::NOT_FOUND,
            "no such element",
            format!("no such element: unable to locate {xpath}"),
        ),
    }
}

fn xpath_of(body: &Value) -> String {
    body["value"].as_str().unwrap_or_default().to_string()
}

async fn find_from_root(
    State(engine): State<FakeEngine>,
    Path(_sid): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    respond_find(&engine, &xpath_of(&body), false)
}

async fn find_all_from_root(
    State(engine): State<FakeEngine>,
    Path(_sid): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    respond_find(&engine, &xpath_of(&body), true)
}

async fn find_from_element(
    State(engine): State<FakeEngine>,
    Path((_sid, _eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    respond_find(&engine, &xpath_of(&body), false)
}

async fn find_all_from_element(
    State(engine): State<FakeEngine>,
    Path((_sid, _eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    respond_find(&engine, &xpath_of(&body), true)
}

async fn element_attribute(
    State(engine): State<FakeEngine>,
    Path((_sid, eid, name)): Path<(String, String, String)>,
) -> Response {
    let state = engine.state.lock().unwrap();
    if state.stale.contains(&eid) {
        return wire_error(
            StatusCode::NOT_FOUND,
            "stale element reference",
            format!("stale element reference: {eid} is no longer attached"),
        );
    }
    let value = state
        .attributes
        .get(&eid)
        .and_then(|attrs| attrs.get(&name))
        .cloned();
    match value {
        Some(value) => value_ok(Value::String(value)),
        None => value_ok(Value::Null),
    }
}

async fn element_text(
    State(engine): State<FakeEngine>,
    Path((_sid, eid)): Path<(String, String)>,
) -> Response {
    let state = engine.state.lock().unwrap();
    if state.text_failures.contains(&eid) {
        return wire_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unknown error",
            "unknown error: text read failed".to_string(),
        );
    }
    let text = state.texts.get(&eid).cloned().unwrap_or_default();
    value_ok(Value::String(text))
}

async fn element_displayed(
    State(_engine): State<FakeEngine>,
    Path((_sid, _eid)): Path<(String, String)>,
) -> Response {
    value_ok(Value::Bool(true))
}

async fn element_click(
    State(engine): State<FakeEngine>,
    Path((_sid, eid)): Path<(String, String)>,
) -> Response {
    engine.state.lock().unwrap().clicks.push(eid);
    value_ok(Value::Null)
}

async fn execute_sync(
    State(engine): State<FakeEngine>,
    Path(_sid): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let script = body["script"].as_str().unwrap_or_default().to_string();
    engine.state.lock().unwrap().scripts.push(script);
    value_ok(Value::Null)
}

async fn unknown_command(uri: Uri) -> Response {
    wire_error(
        StatusCode::NOT_FOUND,
        "unknown command",
        format!("unknown command: {uri}"),
    )
}
