#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use streamify_client::{ApiClient, ClientConfig};
use streamify_common::{
    FriendRequest, FriendRequestId, FriendRequestStatus, FriendRequestWithSender, RecommendedUser,
    SigninRequest, SignupRequest, User, UserId,
};

pub const VIEWER: &str = "me";
const SESSION_COOKIE: &str = "jwt-auth-token.streamify=token";

/// One request the fake server received.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
}

impl Hit {
    pub fn page(&self) -> Option<u32> {
        self.query.get("page")?.parse().ok()
    }
}

#[derive(Default)]
pub struct Backend {
    pub candidates: Vec<User>,
    pub requests: Vec<FriendRequest>,
    pub incoming: Vec<FriendRequestWithSender>,
    pub hits: Vec<Hit>,
    pub fail_create: bool,
    pub taken_emails: Vec<String>,
}

#[derive(Clone, Default)]
pub struct State(pub Arc<Mutex<Backend>>);

impl State {
    pub fn with<R>(&self, func: impl FnOnce(&mut Backend) -> R) -> R {
        func(&mut self.0.lock().unwrap())
    }

    pub fn hits(&self, path: &str) -> Vec<Hit> {
        self.with(|backend| backend.hits.iter().filter(|hit| hit.path == path).cloned().collect())
    }

    fn record(&self, method: &'static str, path: String, query: HashMap<String, String>) {
        self.with(|backend| backend.hits.push(Hit { method, path, query }));
    }
}

pub struct FakeApi {
    pub state: State,
    pub addr: SocketAddr,
}

impl FakeApi {
    pub async fn spawn(state: State) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let api = Router::new()
            .route("/auth/me", get(me))
            .route("/auth/signup", post(signup))
            .route("/auth/signin", post(signin))
            .route("/users/recommended", get(recommended))
            .route("/users/friends-request/from", get(incoming))
            .route("/users/friends-request/create/:recipient", post(create_request))
            .route("/users/friends-request/accept/:id", post(accept_request));
        let app = Router::new().nest("/api/v1", api).layer(Extension(state.clone()));
        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        Self { state, addr }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_url: format!("http://localhost:{}", self.addr.port()),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).unwrap()
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: UserId(id.to_string()),
        full_name: name.to_string(),
        email: format!("{id}@example.com"),
        bio: String::new(),
        profile_pic: format!("https://avatar.example.com/{id}.png"),
        native_lng: "spanish".to_string(),
        learning_lng: "english".to_string(),
        location: String::new(),
        is_onboarded: true,
        friend_ids: Vec::new(),
        created_at: Some(chrono::Utc::now()),
        updated_at: Some(chrono::Utc::now()),
    }
}

/// `count` candidates named `{prefix}{n}`.
pub fn candidates(prefix: &str, count: usize) -> Vec<User> {
    (0..count).map(|n| user(&format!("{prefix}-{n}"), &format!("{prefix}{n}"))).collect()
}

fn error(status: StatusCode, error: Value) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

fn paginate<T: serde::Serialize>(
    items: Vec<T>,
    query: &HashMap<String, String>,
) -> (Vec<T>, Value) {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let page_size: usize = query.get("page_size").and_then(|p| p.parse().ok()).unwrap_or(10);
    let total = items.len();
    if total == 0 {
        return (Vec::new(), json!({}));
    }
    let last_page = (total + page_size - 1) / page_size;
    let slice = items.into_iter().skip((page - 1) * page_size).take(page_size).collect();
    let metadata = json!({
        "current_page": page,
        "page_size": page_size,
        "first_page": 1,
        "last_page": last_page,
        "total_records": total,
    });
    (slice, metadata)
}

async fn me(Extension(state): Extension<State>, headers: HeaderMap) -> Response {
    state.record("GET", "/auth/me".into(), HashMap::new());
    let signed_in = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |cookie| cookie.contains(SESSION_COOKIE));
    if !signed_in {
        let message = json!("you must be authenticated to access this resource");
        return error(StatusCode::UNAUTHORIZED, message);
    }
    Json(json!({ "user": user(VIEWER, "Viewer") })).into_response()
}

async fn signup(Extension(state): Extension<State>, Json(form): Json<SignupRequest>) -> Response {
    state.record("POST", "/auth/signup".into(), HashMap::new());
    if state.with(|backend| backend.taken_emails.contains(&form.email)) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, json!({ "email": ["already taken"] }));
    }
    let mut created = user("new", &form.fullname);
    created.email = form.email;
    created.is_onboarded = false;
    (StatusCode::ACCEPTED, Json(json!({ "user": created }))).into_response()
}

async fn signin(Extension(state): Extension<State>, Json(form): Json<SigninRequest>) -> Response {
    state.record("POST", "/auth/signin".into(), HashMap::new());
    if form.password.is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, json!({ "password": ["is required"] }));
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))],
        Json(json!({ "user": user(VIEWER, "Viewer") })),
    )
        .into_response()
}

async fn recommended(
    Extension(state): Extension<State>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET", "/users/recommended".into(), query.clone());
    let needle = query.get("query").cloned().unwrap_or_default().to_lowercase();
    let users: Vec<RecommendedUser> = state.with(|backend| {
        backend
            .candidates
            .iter()
            .filter(|candidate| candidate.full_name.to_lowercase().contains(&needle))
            .map(|candidate| RecommendedUser {
                user: candidate.clone(),
                sent_friend_request: backend
                    .requests
                    .iter()
                    .filter(|r| r.sender_id.0 == VIEWER && r.recipient_id == candidate.id)
                    .cloned()
                    .collect(),
                from_friend_request: backend
                    .requests
                    .iter()
                    .filter(|r| r.recipient_id.0 == VIEWER && r.sender_id == candidate.id)
                    .cloned()
                    .collect(),
            })
            .collect()
    });
    let (users, metadata) = paginate(users, &query);
    Json(json!({ "users": users, "metadata": metadata })).into_response()
}

async fn incoming(
    Extension(state): Extension<State>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET", "/users/friends-request/from".into(), query.clone());
    let requests = state.with(|backend| backend.incoming.clone());
    let (requests, metadata) = paginate(requests, &query);
    Json(json!({ "friend_requests": requests, "metadata": metadata })).into_response()
}

async fn create_request(
    Extension(state): Extension<State>,
    Path(recipient): Path<String>,
) -> Response {
    state.record("POST", "/users/friends-request/create".into(), HashMap::new());
    // let the caller's second click land while this one is still open
    tokio::time::sleep(Duration::from_millis(20)).await;
    state.with(|backend| {
        if backend.fail_create {
            let message = json!("the server encountered a problem");
            return error(StatusCode::INTERNAL_SERVER_ERROR, message);
        }
        let exists = backend.requests.iter().any(|r| r.recipient_id.0 == recipient);
        if exists {
            return error(
                StatusCode::BAD_REQUEST,
                json!("friend request already exist between you and this user"),
            );
        }
        let request = FriendRequest {
            id: FriendRequestId(format!("req-{}", backend.requests.len())),
            sender_id: UserId(VIEWER.to_string()),
            recipient_id: UserId(recipient),
            status: FriendRequestStatus::Pending,
            created_at: Some(chrono::Utc::now()),
            updated_at: Some(chrono::Utc::now()),
        };
        backend.requests.push(request.clone());
        (StatusCode::CREATED, Json(json!({ "friend_request": request }))).into_response()
    })
}

async fn accept_request(Extension(state): Extension<State>, Path(id): Path<String>) -> Response {
    state.record("POST", "/users/friends-request/accept".into(), HashMap::new());
    state.with(|backend| {
        let Some(position) = backend.incoming.iter().position(|r| r.request.id.0 == id) else {
            return error(StatusCode::NOT_FOUND, json!("the requested resource could not be found"));
        };
        let mut accepted = backend.incoming.remove(position).request;
        accepted.status = FriendRequestStatus::Accepted;
        Json(json!({ "friend_request": accepted })).into_response()
    })
}

/// Polls until `done` holds, failing the test after a few seconds.
pub async fn eventually(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
