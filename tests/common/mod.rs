#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use lendflow_client::config::ClientConfig;
use lendflow_client::session::MemoryStorage;
use lendflow_client::App;

pub const PASSWORD: &str = "secret123";

/// In-process stand-in for the loan-management backend
pub struct FakeBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

#[derive(Default)]
pub struct BackendState {
    hits: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, (u16, Value)>>,
    delay: Mutex<Option<Duration>>,
    last_authorization: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    leads: Mutex<Vec<Value>>,
    banks: Mutex<Vec<Value>>,
    telecallers: Mutex<Vec<Value>>,
    users: Mutex<Vec<Value>>,
    projects: Mutex<Vec<Value>>,
}

impl BackendState {
    fn seeded() -> Self {
        let state = Self::default();
        *state.leads.lock().unwrap() = vec![
            json!({"id": 42, "name": "Ravi Kumar", "status": "new", "assignedToId": null}),
            json!({"id": 43, "name": "Meera Iyer", "status": "contacted", "assignedToId": 8}),
        ];
        *state.banks.lock().unwrap() = vec![
            json!({"id": 1, "name": "HDFC Bank"}),
            json!({"id": 2, "name": "ICICI Bank"}),
            json!({"id": 3, "name": "State Bank of India"}),
        ];
        *state.telecallers.lock().unwrap() = vec![
            json!({"id": 7, "name": "Kiran Rao", "email": "kiran@example.com"}),
        ];
        *state.users.lock().unwrap() = vec![
            json!({"id": 5, "username": "asha", "role": "builder"}),
        ];
        state
    }

    /// Requests seen for `"METHOD /path"`, e.g. `"GET /api/banks"`
    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    /// Answers `route` with `status` and `body` until [`BackendState::recover`]
    pub fn fail(&self, route: &str, status: u16, body: Value) {
        self.failures
            .lock()
            .unwrap()
            .insert(route.to_string(), (status, body));
    }

    pub fn recover(&self, route: &str) {
        self.failures.lock().unwrap().remove(route);
    }

    /// Delays every GET under `/api`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Most requests under `/api` that were ever being served at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }

    pub fn lead(&self, id: u64) -> Option<Value> {
        self.leads
            .lock()
            .unwrap()
            .iter()
            .find(|lead| lead["id"] == json!(id))
            .cloned()
    }
}

impl FakeBackend {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        let state = Arc::new(BackendState::seeded());
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            state,
        })
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_base_url(&self.base_url);
        config.api.timeout_secs = 5;
        config.api.enable_request_logging = false;
        config
    }

    pub fn app(&self) -> Result<App> {
        Ok(App::with_storage(self.config(), Arc::new(MemoryStorage::new()))?)
    }

    pub async fn logged_in(&self, username: &str) -> Result<App> {
        let app = self.app()?;
        app.login(username, PASSWORD).await?;
        Ok(app)
    }
}

/// Base URL where nothing is listening
pub fn unreachable_base_url() -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    Ok(format!("http://127.0.0.1:{}", port))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/api/leads", get(list_leads))
        .route("/api/leads/:id", get(get_lead))
        .route("/api/leads/:id/assign", post(assign_lead))
        .route("/api/banks", get(list_banks).post(create_bank))
        .route("/api/banks/:id", delete(delete_bank))
        .route("/api/telecallers", get(list_telecallers))
        .route("/api/users", get(list_users))
        .route("/register/user", post(register_user))
        .route("/project/add", post(add_project))
        .route("/api/projects", get(list_projects))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), track))
        .with_state(state)
}

/// Counts hits, applies injected failures and delays, and enforces bearer auth under `/api`
async fn track(State(state): State<Arc<BackendState>>, request: Request, next: Next) -> Response {
    let route = format!("{} {}", request.method(), request.uri().path());
    *state.hits.lock().unwrap().entry(route.clone()).or_insert(0) += 1;

    let is_api = request.uri().path().starts_with("/api");
    let is_get = *request.method() == axum::http::Method::GET;

    if !is_api {
        return respond(&state, &route, false, false, request, next).await;
    }
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    let response = respond(&state, &route, is_api, is_get, request, next).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

async fn respond(
    state: &BackendState,
    route: &str,
    is_api: bool,
    is_get: bool,
    request: Request,
    next: Next,
) -> Response {
    let delay = *state.delay.lock().unwrap();
    if let (true, true, Some(delay)) = (is_api, is_get, delay) {
        tokio::time::sleep(delay).await;
    }

    let failure = state.failures.lock().unwrap().get(route).cloned();
    if let Some((status, body)) = failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return match body {
            Value::String(text) => (status, text).into_response(),
            body => (status, Json(body)).into_response(),
        };
    }

    if is_api || request.uri().path().starts_with("/register") || request.uri().path().starts_with("/project") {
        let authorization = bearer(request.headers());
        *state.last_authorization.lock().unwrap() = authorization.clone();
        if authorization.is_none() {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Authentication required"})),
            )
                .into_response();
        }
    }

    next.run(request).await
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match (username, password) {
        ("asha", PASSWORD) => Json(json!({
            "token": "token-asha",
            "id": 5,
            "username": "asha",
            "email": "asha@example.com",
            "firstName": "Asha",
            "lastName": "Verma",
            "role": "builder"
        }))
        .into_response(),
        ("kiran", PASSWORD) => Json(json!({
            "token": "token-kiran",
            "user": {"id": "9", "username": "kiran", "email": "kiran@example.com", "role": "telecaller"}
        }))
        .into_response(),
        ("root", PASSWORD) => Json(json!({
            "token": "token-root",
            "email": "root@example.com",
            "role": "super_admin"
        }))
        .into_response(),
        ("moderator", PASSWORD) => Json(json!({
            "token": "token-moderator",
            "email": "mod@example.com",
            "role": "moderator"
        }))
        .into_response(),
        ("locked", _) => (
            StatusCode::FORBIDDEN,
            Json(json!({"kind": "invalid_credentials", "message": "Account is locked"})),
        )
            .into_response(),
        ("broken", _) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid username or password"})),
        )
            .into_response(),
    }
}

async fn list_leads(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let leads: Vec<Value> = state
        .leads
        .lock()
        .unwrap()
        .iter()
        .filter(|lead| match query.get("status") {
            Some(status) => lead["status"] == json!(status),
            None => true,
        })
        .cloned()
        .collect();
    let total = leads.len();
    Json(json!({"leads": leads, "total": total}))
}

async fn get_lead(State(state): State<Arc<BackendState>>, Path(id): Path<u64>) -> Response {
    match state.lead(id) {
        Some(lead) => Json(lead).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Lead not found"}))).into_response(),
    }
}

async fn assign_lead(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    let mut leads = state.leads.lock().unwrap();
    match leads.iter_mut().find(|lead| lead["id"] == json!(id)) {
        Some(lead) => {
            lead["assignedToId"] = body["assignedToId"].clone();
            Json(json!({"message": "Lead assigned", "lead": lead.clone()})).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Lead not found"}))).into_response(),
    }
}

async fn list_banks(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let banks = state.banks.lock().unwrap().clone();
    let total = banks.len();
    Json(json!({"banks": banks, "total": total}))
}

async fn create_bank(State(state): State<Arc<BackendState>>, Json(mut body): Json<Value>) -> Response {
    let mut banks = state.banks.lock().unwrap();
    let id = banks.iter().filter_map(|b| b["id"].as_u64()).max().unwrap_or(0) + 1;
    body["id"] = json!(id);
    banks.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn delete_bank(State(state): State<Arc<BackendState>>, Path(id): Path<u64>) -> Response {
    let mut banks = state.banks.lock().unwrap();
    let before = banks.len();
    banks.retain(|bank| bank["id"] != json!(id));
    if banks.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Bank not found"}))).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_telecallers(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let telecallers = state.telecallers.lock().unwrap().clone();
    Json(json!({"telecallers": telecallers}))
}

async fn list_users(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let users = state.users.lock().unwrap().clone();
    let total = users.len();
    Json(json!({"users": users, "total": total}))
}

async fn register_user(State(state): State<Arc<BackendState>>, Json(mut body): Json<Value>) -> Response {
    let mut users = state.users.lock().unwrap();
    body["id"] = json!(users.len() as u64 + 100);
    if let Some(user) = body.as_object_mut() {
        user.remove("password");
    }
    users.push(body.clone());
    (StatusCode::CREATED, Json(json!({"message": "User registered", "user": body}))).into_response()
}

async fn add_project(State(state): State<Arc<BackendState>>, Json(mut body): Json<Value>) -> Response {
    let mut projects = state.projects.lock().unwrap();
    body["id"] = json!(projects.len() as u64 + 1);
    projects.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn list_projects(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let projects = state.projects.lock().unwrap().clone();
    let total = projects.len();
    Json(json!({"projects": projects, "total": total}))
}
