//! In-process booking backend for integration tests.
//!
//! Tokens are predictable: login hands out `T1`/`R1`, and every successful
//! refresh issues `T2`, `T3`, ... while keeping `R1` unless rotation is on.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use booking_client::{ApiClient, ClientConfig, MemoryTokenStore, TokenStore};
use serde_json::{json, Value};

type Reply = Result<Response, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

/// Backend state shared with the test body.
pub struct MockState {
    access_token: Mutex<String>,
    refresh_token: Mutex<String>,
    next_token: AtomicUsize,
    rotate_refresh: AtomicBool,
    refresh_fails: AtomicBool,
    reject_all: AtomicBool,
    refresh_delay: Mutex<Duration>,
    bookings_delay: Mutex<Duration>,
    refresh_calls: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<String>>,
    me_calls: AtomicUsize,
    /// `(path, bearer)` of every request to a protected endpoint.
    seen: Mutex<Vec<(String, Option<String>)>>,
    /// email -> (password, user)
    accounts: Mutex<HashMap<String, (String, Value)>>,
    current_email: Mutex<Option<String>>,
    slots: Mutex<Vec<Value>>,
    bookings: Mutex<Vec<Value>>,
}

impl MockState {
    fn new() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "a@x.com".to_string(),
            (
                "secret1".to_string(),
                json!({
                    "id": 1,
                    "email": "a@x.com",
                    "full_name": "Ann Student",
                    "role": "student",
                    "created_at": "2024-01-01T09:00:00"
                }),
            ),
        );
        accounts.insert(
            "t@x.com".to_string(),
            (
                "secret1".to_string(),
                json!({
                    "id": 2,
                    "email": "t@x.com",
                    "full_name": "Tess Teacher",
                    "role": "teacher",
                    "created_at": "2024-01-01T09:00:00"
                }),
            ),
        );

        let slots = vec![
            json!({"id": 10, "teacher_id": 2, "start_time": "2024-05-01T10:00:00",
                   "end_time": "2024-05-01T11:00:00", "is_booked": false}),
            json!({"id": 11, "teacher_id": 2, "start_time": "2024-05-02T10:00:00",
                   "end_time": "2024-05-02T11:00:00", "is_booked": false}),
        ];

        Self {
            access_token: Mutex::new("T1".into()),
            refresh_token: Mutex::new("R1".into()),
            next_token: AtomicUsize::new(2),
            rotate_refresh: AtomicBool::new(false),
            refresh_fails: AtomicBool::new(false),
            reject_all: AtomicBool::new(false),
            refresh_delay: Mutex::new(Duration::ZERO),
            bookings_delay: Mutex::new(Duration::ZERO),
            refresh_calls: AtomicUsize::new(0),
            refresh_tokens_seen: Mutex::new(Vec::new()),
            me_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            accounts: Mutex::new(accounts),
            current_email: Mutex::new(Some("a@x.com".into())),
            slots: Mutex::new(slots),
            bookings: Mutex::new(Vec::new()),
        }
    }

    /// Invalidate the current access token; the refresh token stays valid.
    pub fn expire_access_token(&self) {
        *self.access_token.lock().unwrap() = "expired".into();
    }

    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    /// Refresh keeps working but no access token is ever accepted.
    pub fn reject_all_tokens(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    pub fn rotate_refresh_tokens(&self) {
        self.rotate_refresh.store(true, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Hold `GET /api/bookings` for `delay` before checking its bearer.
    pub fn set_bookings_delay(&self, delay: Duration) {
        *self.bookings_delay.lock().unwrap() = delay;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    /// Total requests to protected endpoints.
    pub fn protected_requests(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Bearer tokens seen on `path`, in arrival order.
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    pub fn access_token(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }

    fn authorize(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Value, (StatusCode, Json<Value>)> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.seen
            .lock()
            .unwrap()
            .push((path.to_string(), bearer.clone()));

        let valid = *self.access_token.lock().unwrap() == bearer.unwrap_or_default();
        if !valid || self.reject_all.load(Ordering::SeqCst) {
            return Err(reject(
                StatusCode::UNAUTHORIZED,
                "Could not validate credentials",
            ));
        }
        self.current_user()
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "User not found"))
    }

    fn current_user(&self) -> Option<Value> {
        let email = self.current_email.lock().unwrap().clone()?;
        self.accounts
            .lock()
            .unwrap()
            .get(&email)
            .map(|(_, user)| user.clone())
    }

    fn issue_tokens(&self, user: Value) -> Value {
        json!({
            "access_token": *self.access_token.lock().unwrap(),
            "refresh_token": *self.refresh_token.lock().unwrap(),
            "token_type": "bearer",
            "user": user
        })
    }
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client with an empty in-memory store.
    pub fn client(&self) -> Arc<ApiClient> {
        self.client_with(MemoryTokenStore::new())
    }

    pub fn client_with(&self, store: impl TokenStore + 'static) -> Arc<ApiClient> {
        let config = ClientConfig::new(self.url()).with_timeout(Duration::from_secs(10));
        Arc::new(ApiClient::new(config, Arc::new(store)).unwrap())
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/users/me", get(me).put(update_me))
        .route("/api/teachers", get(list_teachers))
        .route(
            "/api/teachers/{id}/availability",
            get(list_slots).post(create_slot),
        )
        .route(
            "/api/teachers/availability/{id}",
            put(update_slot).delete(delete_slot),
        )
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/{id}", delete(cancel_booking))
        .route("/api/bookings/{id}/confirm", put(confirm_booking))
        .route("/api/students/my-bookings", get(student_bookings))
        .with_state(state)
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();

    let user = match state.accounts.lock().unwrap().get(&email) {
        Some((expected, user)) if expected == password => user.clone(),
        _ => {
            return Err(reject(
                StatusCode::UNAUTHORIZED,
                "Incorrect email or password",
            ))
        }
    };
    *state.current_email.lock().unwrap() = Some(email);
    Ok(Json(state.issue_tokens(user)).into_response())
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    let user = {
        let mut accounts = state.accounts.lock().unwrap();
        if accounts.contains_key(&email) {
            return Err(reject(StatusCode::BAD_REQUEST, "Email already registered"));
        }
        let user = json!({
            "id": accounts.len() as i64 + 1,
            "email": email,
            "full_name": body["full_name"],
            "role": body["role"],
            "created_at": "2024-02-01T09:00:00"
        });
        accounts.insert(email.clone(), (password, user.clone()));
        user
    };
    *state.current_email.lock().unwrap() = Some(email);
    Ok((StatusCode::CREATED, Json(state.issue_tokens(user))).into_response())
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let presented = body["refresh_token"].as_str().unwrap_or_default().to_string();
    state.refresh_tokens_seen.lock().unwrap().push(presented.clone());

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let valid = *state.refresh_token.lock().unwrap() == presented;
    if !valid || state.refresh_fails.load(Ordering::SeqCst) {
        return Err(reject(StatusCode::UNAUTHORIZED, "Invalid refresh token"));
    }

    let n = state.next_token.fetch_add(1, Ordering::SeqCst);
    let access = format!("T{}", n);
    *state.access_token.lock().unwrap() = access.clone();

    let mut reply = json!({ "access_token": access, "token_type": "bearer" });
    if state.rotate_refresh.load(Ordering::SeqCst) {
        let rotated = format!("R{}", n);
        *state.refresh_token.lock().unwrap() = rotated.clone();
        reply["refresh_token"] = json!(rotated);
    }
    Ok(Json(reply).into_response())
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    let user = state.authorize("/api/auth/users/me", &headers)?;
    Ok(Json(user).into_response())
}

async fn update_me(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let user = state.authorize("/api/auth/users/me", &headers)?;

    if let Some(email) = body.get("email").and_then(Value::as_str) {
        if !email.contains('@') {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": [{
                    "loc": ["body", "email"],
                    "msg": "value is not a valid email address",
                    "type": "value_error"
                }]})),
            ));
        }
    }

    let old_email = user["email"].as_str().unwrap_or_default().to_string();
    let mut accounts = state.accounts.lock().unwrap();
    let Some((password, mut updated)) = accounts.remove(&old_email) else {
        return Err(reject(StatusCode::NOT_FOUND, "User not found"));
    };
    if let Some(name) = body.get("full_name").and_then(Value::as_str) {
        updated["full_name"] = json!(name);
    }
    let new_email = body
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or(&old_email)
        .to_string();
    updated["email"] = json!(new_email);
    accounts.insert(new_email.clone(), (password, updated.clone()));
    *state.current_email.lock().unwrap() = Some(new_email);
    Ok(Json(updated).into_response())
}

async fn list_teachers(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    state.authorize("/api/teachers", &headers)?;
    let teachers: Vec<Value> = state
        .accounts
        .lock()
        .unwrap()
        .values()
        .filter(|(_, user)| user["role"] == "teacher")
        .map(|(_, user)| {
            let mut teacher = user.clone();
            teacher["specialization"] = json!("Piano");
            teacher
        })
        .collect();
    Ok(Json(teachers).into_response())
}

async fn list_slots(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(teacher_id): Path<i64>,
) -> Reply {
    state.authorize(&format!("/api/teachers/{}/availability", teacher_id), &headers)?;
    let slots: Vec<Value> = state
        .slots
        .lock()
        .unwrap()
        .iter()
        .filter(|slot| slot["teacher_id"] == teacher_id)
        .cloned()
        .collect();
    Ok(Json(slots).into_response())
}

fn check_window(start: &str, end: &str) -> Result<(), (StatusCode, Json<Value>)> {
    // ISO-8601 timestamps order lexically
    if end <= start {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "End time must be after start time",
        ));
    }
    Ok(())
}

async fn create_slot(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(teacher_id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = state.authorize(&format!("/api/teachers/{}/availability", teacher_id), &headers)?;
    if user["role"] != "teacher" || user["id"] != teacher_id {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Not authorized to manage this teacher's availability",
        ));
    }

    let start = body["start_time"].as_str().unwrap_or_default();
    let end = body["end_time"].as_str().unwrap_or_default();
    check_window(start, end)?;

    let mut slots = state.slots.lock().unwrap();
    let id = slots
        .iter()
        .filter_map(|slot| slot["id"].as_i64())
        .max()
        .unwrap_or(9)
        + 1;
    let slot = json!({
        "id": id,
        "teacher_id": teacher_id,
        "start_time": start,
        "end_time": end,
        "is_booked": false,
        "created_at": "2024-04-01T08:00:00"
    });
    slots.push(slot.clone());
    Ok((StatusCode::CREATED, Json(slot)).into_response())
}

async fn update_slot(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = state.authorize(&format!("/api/teachers/availability/{}", id), &headers)?;
    let mut slots = state.slots.lock().unwrap();
    let Some(slot) = slots.iter_mut().find(|s| s["id"] == id) else {
        return Err(reject(StatusCode::NOT_FOUND, "Availability slot not found"));
    };
    if slot["teacher_id"] != user["id"] {
        return Err(reject(StatusCode::FORBIDDEN, "Not authorized to update this slot"));
    }
    if slot["is_booked"] == true {
        return Err(reject(StatusCode::BAD_REQUEST, "Cannot update a booked slot"));
    }

    let start = body["start_time"]
        .as_str()
        .or_else(|| slot["start_time"].as_str())
        .unwrap_or_default()
        .to_string();
    let end = body["end_time"]
        .as_str()
        .or_else(|| slot["end_time"].as_str())
        .unwrap_or_default()
        .to_string();
    check_window(&start, &end)?;

    slot["start_time"] = json!(start);
    slot["end_time"] = json!(end);
    Ok(Json(slot.clone()).into_response())
}

async fn delete_slot(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    let user = state.authorize(&format!("/api/teachers/availability/{}", id), &headers)?;
    let mut slots = state.slots.lock().unwrap();
    let Some(index) = slots.iter().position(|s| s["id"] == id) else {
        return Err(reject(StatusCode::NOT_FOUND, "Availability slot not found"));
    };
    if slots[index]["teacher_id"] != user["id"] {
        return Err(reject(StatusCode::FORBIDDEN, "Not authorized to delete this slot"));
    }
    if slots[index]["is_booked"] == true {
        return Err(reject(StatusCode::BAD_REQUEST, "Cannot delete a booked slot"));
    }
    slots.remove(index);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_bookings(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    let delay = *state.bookings_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    state.authorize("/api/bookings", &headers)?;
    let bookings = state.bookings.lock().unwrap().clone();
    Ok(Json(bookings).into_response())
}

async fn create_booking(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let user = state.authorize("/api/bookings", &headers)?;
    if user["role"] != "student" {
        return Err(reject(StatusCode::FORBIDDEN, "Only students can book lessons"));
    }

    let availability_id = body["availability_id"].as_i64().unwrap_or_default();
    let mut slots = state.slots.lock().unwrap();
    let Some(slot) = slots.iter_mut().find(|s| s["id"] == availability_id) else {
        return Err(reject(StatusCode::NOT_FOUND, "Availability slot not found"));
    };
    if slot["is_booked"] == true {
        return Err(reject(StatusCode::BAD_REQUEST, "This slot is already booked"));
    }
    slot["is_booked"] = json!(true);

    let mut bookings = state.bookings.lock().unwrap();
    let booking = json!({
        "id": bookings.len() as i64 + 100,
        "teacher_id": slot["teacher_id"],
        "student_id": user["id"],
        "availability_id": availability_id,
        "status": "pending",
        "created_at": "2024-04-20T12:00:00",
        "start_time": slot["start_time"],
        "end_time": slot["end_time"],
        "teacher_name": "Tess Teacher",
        "notes": body["notes"]
    });
    bookings.push(booking.clone());
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

async fn student_bookings(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    let user = state.authorize("/api/students/my-bookings", &headers)?;
    let bookings: Vec<Value> = state
        .bookings
        .lock()
        .unwrap()
        .iter()
        .filter(|b| b["student_id"] == user["id"])
        .cloned()
        .collect();
    Ok(Json(bookings).into_response())
}

async fn confirm_booking(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    state.authorize(&format!("/api/bookings/{}/confirm", id), &headers)?;
    let mut bookings = state.bookings.lock().unwrap();
    let Some(booking) = bookings.iter_mut().find(|b| b["id"] == id) else {
        return Err(reject(StatusCode::NOT_FOUND, "Booking not found"));
    };
    booking["status"] = json!("confirmed");
    Ok(Json(booking.clone()).into_response())
}

async fn cancel_booking(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    state.authorize(&format!("/api/bookings/{}", id), &headers)?;
    let mut bookings = state.bookings.lock().unwrap();
    let before = bookings.len();
    bookings.retain(|b| b["id"] != id);
    if bookings.len() == before {
        return Err(reject(StatusCode::NOT_FOUND, "Booking not found"));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
