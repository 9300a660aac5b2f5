//! Integration tests for CopyHub.
//!
//! The tests run the real client and web app against [`MockBackend`], an
//! in-process axum server that speaks the slice of the backend REST API the
//! tests need. Nothing outside the process is required:
//!
//! ```bash
//! cargo test -p copyhub-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `client_auth` - bearer auth, one refresh and retry, sign-out on refresh failure
//! - `client_retry` - backoff retries for idempotent requests only
//! - `client_orders` - multipart order creation, error rewording, checkout
//! - `client_state` - lifecycle changes and the pickup code follow-up
//! - `client_cache` - optimistic agency product deletion and rollback
//! - `session_watcher` - background revalidation
//! - `web_smoke` - the web app end to end over HTTP

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeZone, Utc};
use copyhub_client::{ApiClient, ApiConfig, RetryPolicy};
use copyhub_core::{
    AgencyId, AgencyProduct, AgencyProductId, ColorOption, FileId, Order, OrderCode, OrderFile,
    OrderState, PaperType, PrintType, ProductId, UserId,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Password the mock accepts for every account.
pub const PASSWORD: &str = "correct horse";

/// The agency every mock endpoint talks about.
pub const AGENCY_ID: AgencyId = AgencyId::new(3);

/// Pickup code the mock issues for finished orders.
pub const PICKUP_CODE: &str = "PICK42";

/// User id carried by tokens the mock issues.
pub const USER_ID: i32 = 7;

/// Build an unsigned JWT with the backend's claim names.
///
/// `nonce` only makes otherwise identical tokens differ.
#[must_use]
pub fn token(user_id: i32, role: &str, exp: i64, nonce: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier": user_id.to_string(),
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name": "printfan",
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress": "fan@example.com",
        "http://schemas.microsoft.com/ws/2008/06/identity/claims/role": role,
        "exp": exp,
        "jti": nonce,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// A customer token valid for ten minutes.
#[must_use]
pub fn live_token(nonce: u64) -> String {
    token(USER_ID, "Customer", Utc::now().timestamp() + 600, nonce)
}

/// A customer token that expired a minute ago.
#[must_use]
pub fn expired_token() -> String {
    token(USER_ID, "Customer", Utc::now().timestamp() - 60, 0)
}

/// An order as the mock returns it.
#[must_use]
pub fn sample_order(code: &str, state: OrderState) -> Order {
    let placed = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).single().unwrap_or_default();
    Order {
        order_code: OrderCode::from(code),
        agency_id: AGENCY_ID,
        agency_name: Some("Print Point".to_string()),
        customer_id: UserId::new(USER_ID),
        customer_name: Some("printfan".to_string()),
        paper_type: PaperType::A4,
        color_option: ColorOption::BlackAndWhite,
        print_type: PrintType::OneSided,
        page_count: 12,
        copy_count: 2,
        price_per_page: Decimal::new(10, 2),
        total_price: Decimal::new(240, 2),
        state,
        created_at: placed,
        updated_at: placed,
        files: vec![OrderFile {
            id: FileId::new(41),
            file_name: "thesis.pdf".to_string(),
            page_count: 12,
        }],
        completion_code: None,
    }
}

/// The agency's price list as the mock returns it.
#[must_use]
pub fn price_list() -> Vec<AgencyProduct> {
    vec![
        AgencyProduct {
            id: AgencyProductId::new(1),
            agency_id: AGENCY_ID,
            product_id: ProductId::new(10),
            paper_type: PaperType::A4,
            color_option: ColorOption::BlackAndWhite,
            print_type: PrintType::OneSided,
            price: Decimal::new(10, 2),
        },
        AgencyProduct {
            id: AgencyProductId::new(2),
            agency_id: AGENCY_ID,
            product_id: ProductId::new(11),
            paper_type: PaperType::A4,
            color_option: ColorOption::Color,
            print_type: PrintType::OneSided,
            price: Decimal::new(45, 2),
        },
    ]
}

/// What the mock saw of a multipart order upload.
#[derive(Debug, Clone, Default)]
pub struct ReceivedOrder {
    pub order: Value,
    /// File name and size of each `files` part.
    pub files: Vec<(String, usize)>,
}

/// Shared mock state: hit counters, scripted failures and captured bodies.
#[derive(Debug, Default)]
pub struct MockState {
    hits: Mutex<HashMap<&'static str, usize>>,
    scripted: Mutex<HashMap<&'static str, VecDeque<(StatusCode, Value)>>>,
    accepted_token: Mutex<Option<String>>,
    refresh_allowed: Mutex<bool>,
    issued: Mutex<u64>,
    received_order: Mutex<Option<ReceivedOrder>>,
    checkout_request: Mutex<Option<Value>>,
    state_changes: Mutex<Vec<Value>>,
    /// When set, the only refresh token accepted; each refresh rotates it.
    live_refresh: Mutex<Option<String>>,
}

impl MockState {
    /// Requests seen on `route` so far.
    pub fn hits(&self, route: &'static str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    /// Answer the next request on `route` with `status` and `body` instead
    /// of the normal response. Queued answers are used in order.
    pub fn script(&self, route: &'static str, status: StatusCode, body: Value) {
        self.scripted
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back((status, body));
    }

    /// The only bearer token authenticated routes accept.
    pub fn accept_token(&self, token: impl Into<String>) {
        *self.accepted_token.lock().unwrap() = Some(token.into());
    }

    /// Accept only `token` for the next refresh, then only the newly issued
    /// refresh token after each successful refresh.
    pub fn rotate_refresh_tokens(&self, token: impl Into<String>) {
        *self.live_refresh.lock().unwrap() = Some(token.into());
    }

    pub fn allow_refresh(&self, allowed: bool) {
        *self.refresh_allowed.lock().unwrap() = allowed;
    }

    pub fn received_order(&self) -> Option<ReceivedOrder> {
        self.received_order.lock().unwrap().clone()
    }

    pub fn checkout_request(&self) -> Option<Value> {
        self.checkout_request.lock().unwrap().clone()
    }

    /// Bodies of the accepted state change requests, oldest first.
    pub fn state_changes(&self) -> Vec<Value> {
        self.state_changes.lock().unwrap().clone()
    }

    /// Count the hit and pop a scripted answer, if any.
    fn enter(&self, route: &'static str) -> Option<Response> {
        *self.hits.lock().unwrap().entry(route).or_default() += 1;
        self.scripted
            .lock()
            .unwrap()
            .get_mut(route)
            .and_then(VecDeque::pop_front)
            .map(|(status, body)| (status, Json(body)).into_response())
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = self.accepted_token.lock().unwrap().clone();
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));
        matches!((expected, presented), (Some(expected), Some(presented)) if expected == presented)
    }

    /// Issue a fresh pair and make the access token the accepted one.
    fn issue(&self) -> Value {
        let nonce = {
            let mut issued = self.issued.lock().unwrap();
            *issued += 1;
            *issued
        };
        let access = live_token(1000 + nonce);
        let refresh = format!("refresh-{nonce}");
        self.accept_token(access.clone());
        if let Some(live) = self.live_refresh.lock().unwrap().as_mut() {
            live.clone_from(&refresh);
        }
        json!({ "accessToken": access, "refreshToken": refresh })
    }
}

type Shared = Arc<MockState>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn login(State(mock): State<Shared>, Json(body): Json<Value>) -> Response {
    if let Some(scripted) = mock.enter("login") {
        return scripted;
    }
    if body["password"] == PASSWORD {
        Json(mock.issue()).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        )
            .into_response()
    }
}

async fn refresh(State(mock): State<Shared>, Json(body): Json<Value>) -> Response {
    if let Some(scripted) = mock.enter("refresh") {
        return scripted;
    }
    let spent = mock
        .live_refresh
        .lock()
        .unwrap()
        .as_ref()
        .is_some_and(|live| body["refreshToken"] != live.as_str());
    if spent {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "Refresh token already used" })))
            .into_response();
    }
    if *mock.refresh_allowed.lock().unwrap() {
        Json(mock.issue()).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": "Invalid refresh token" }))).into_response()
    }
}

async fn agencies(State(mock): State<Shared>) -> Response {
    if let Some(scripted) = mock.enter("agencies") {
        return scripted;
    }
    Json(json!([
        { "id": AGENCY_ID, "name": "Print Point", "rating": 4.5,
          "location": { "address": "1 Main St", "city": "Springfield" } },
        { "id": 4, "name": "Copy Corner", "rating": 3.0,
          "location": { "address": "9 Elm St", "city": "Shelbyville" } }
    ]))
    .into_response()
}

async fn agency_products(State(mock): State<Shared>, Path(id): Path<i32>) -> Response {
    if let Some(scripted) = mock.enter("agency_products") {
        return scripted;
    }
    if id == AGENCY_ID.as_i32() {
        Json(price_list()).into_response()
    } else {
        Json(Vec::<AgencyProduct>::new()).into_response()
    }
}

async fn delete_agency_product(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(_id): Path<i32>,
) -> Response {
    if let Some(scripted) = mock.enter("delete_agency_product") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn my_orders(State(mock): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(scripted) = mock.enter("my_orders") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(vec![sample_order("K3J9QX", OrderState::Pending)]).into_response()
}

async fn get_order(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    if let Some(scripted) = mock.enter("get_order") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(sample_order(&code, OrderState::Pending)).into_response()
}

async fn set_order_state(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(_code): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(scripted) = mock.enter("set_state") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.state_changes.lock().unwrap().push(body);
    StatusCode::NO_CONTENT.into_response()
}

async fn completion_code(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(_code): Path<String>,
) -> Response {
    if let Some(scripted) = mock.enter("completion_code") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "completionCode": PICKUP_CODE })).into_response()
}

async fn create_order(
    State(mock): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Some(scripted) = mock.enter("create_order") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }

    let mut received = ReceivedOrder::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);
        let Ok(bytes) = field.bytes().await else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        match (name.as_str(), file_name) {
            ("order", _) => {
                received.order = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            }
            ("files", Some(file_name)) => received.files.push((file_name, bytes.len())),
            _ => {}
        }
    }
    *mock.received_order.lock().unwrap() = Some(received);

    (StatusCode::CREATED, Json(sample_order("NEW123", OrderState::Pending))).into_response()
}

async fn checkout_session(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(scripted) = mock.enter("checkout") {
        return scripted;
    }
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    *mock.checkout_request.lock().unwrap() = Some(body);
    Json(json!({ "sessionId": "cs_test_123" })).into_response()
}

/// An in-process stand-in for the CopyHub backend.
///
/// The server stops when the value is dropped.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Shared,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Start the mock on an ephemeral port.
    pub async fn start() -> Self {
        let state = Shared::default();
        state.allow_refresh(true);

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/agencies", get(agencies))
            .route("/agencies/{id}/products", get(agency_products))
            .route("/agency-products/{id}", delete(delete_agency_product))
            .route("/orders", post(create_order))
            .route("/orders/mine", get(my_orders))
            .route("/orders/{code}", get(get_order))
            .route("/orders/{code}/state", put(set_order_state))
            .route("/orders/{code}/completion-code", get(completion_code))
            .route("/checkout/sessions", post(checkout_session))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL of the mock API.
    pub fn api_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Client configuration pointing at the mock, with fast retries.
    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(&self.api_url())
            .expect("mock URL parses")
            .with_retry(RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(5),
            })
    }

    /// A client for the mock.
    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.config()).expect("client builds")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
