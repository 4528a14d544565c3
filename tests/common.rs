use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use admin_session::{ApiConfig, AuthClient};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("admin_session=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";

/// Mutable state of the fake admin API.
#[derive(Debug, Default)]
pub struct Backend {
    pub access_ttl_secs: i64,
    pub refresh_access_ttl_secs: i64,
    pub issued: u64,
    pub valid_access: HashSet<String>,
    pub valid_refresh: HashSet<String>,
    pub login_calls: usize,
    pub refresh_calls: usize,
    pub me_calls: usize,
    pub logout_calls: usize,
    pub last_refresh_query: Option<String>,
}

impl Backend {
    fn issue(&mut self, access_ttl_secs: i64) -> serde_json::Value {
        self.issued += 1;
        let access = format!("access-{}", self.issued);
        let refresh = format!("refresh-{}", self.issued);
        self.valid_access.insert(access.clone());
        self.valid_refresh.insert(refresh.clone());

        let now = OffsetDateTime::now_utc();
        let access_expiry = now + Duration::seconds(access_ttl_secs);
        let refresh_expiry = now + Duration::days(7);
        json!({
            "success": true,
            "access_token": access,
            "refresh_token": refresh,
            "access_token_expires_at": access_expiry.format(&Rfc3339).unwrap(),
            "refresh_token_expires_at": refresh_expiry.format(&Rfc3339).unwrap(),
        })
    }

    /// Server-side revocation of everything issued so far.
    pub fn revoke_all(&mut self) {
        self.valid_access.clear();
        self.valid_refresh.clear();
    }
}

pub type Shared = Arc<Mutex<Backend>>;

pub struct TestApp {
    pub server_url: String,
    pub backend: Shared,
    pub client: AuthClient,
    pub http: reqwest::Client,
}

impl TestApp {
    /// Spawn the fake API; logins hand out access tokens living `access_ttl_secs`.
    pub async fn spawn(access_ttl_secs: i64) -> Self {
        setup_tracing();

        let backend: Shared = Arc::new(Mutex::new(Backend {
            access_ttl_secs,
            refresh_access_ttl_secs: 600,
            ..Backend::default()
        }));

        let app = Router::new()
            .route("/api/auth/admin/login", post(login))
            .route("/api/auth/admin/refresh", post(refresh))
            .route("/api/auth/admin/me", get(me))
            .route("/api/auth/admin/logout", post(logout))
            .route("/api/admin/remedies", get(remedies))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let server_url = format!("http://{addr}/api");
        let http = reqwest::Client::new();
        let client = AuthClient::new(ApiConfig::new(server_url.parse().unwrap()))
            .with_http_client(http.clone());

        Self {
            server_url,
            backend,
            client,
            http,
        }
    }
}

/// Client aimed at a port nothing listens on.
#[allow(dead_code)]
pub async fn unreachable_client() -> AuthClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = format!("http://{addr}/api").parse().unwrap();
    AuthClient::new(ApiConfig::new(base))
}

#[allow(dead_code)]
pub fn temp_session_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("admin-session-it-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

// ── Handlers ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(backend): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let mut backend = backend.lock();
    backend.login_calls += 1;
    if body.email != EMAIL || body.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Invalid credentials"})),
        )
            .into_response();
    }
    let ttl = backend.access_ttl_secs;
    let mut grant = backend.issue(ttl);
    grant["admin"] = json!({"id": 1, "name": "Ada", "email": EMAIL});
    Json(grant).into_response()
}

#[derive(Deserialize)]
struct RefreshQuery {
    refresh_token: Option<String>,
}

async fn refresh(State(backend): State<Shared>, Query(query): Query<RefreshQuery>) -> Response {
    let mut backend = backend.lock();
    backend.refresh_calls += 1;
    backend.last_refresh_query = query.refresh_token.clone();

    let Some(token) = query.refresh_token.filter(|t| backend.valid_refresh.contains(t)) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Invalid refresh token"})),
        )
            .into_response();
    };

    // Rotation: the old pair dies with the refresh.
    backend.valid_refresh.remove(&token);
    let ttl = backend.refresh_access_ttl_secs;
    Json(backend.issue(ttl)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

async fn me(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock();
    backend.me_calls += 1;
    match bearer(&headers) {
        Some(token) if backend.valid_access.contains(&token) => {
            Json(json!({"success": true, "id": 1, "name": "Ada", "email": EMAIL})).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Session expired"})),
        )
            .into_response(),
    }
}

async fn logout(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock();
    backend.logout_calls += 1;
    if let Some(token) = bearer(&headers) {
        backend.valid_access.remove(&token);
    }
    Json(json!({"success": true})).into_response()
}

async fn remedies(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let backend = backend.lock();
    match bearer(&headers) {
        Some(token) if backend.valid_access.contains(&token) => {
            Json(json!({"success": true, "data": [{"id": 1, "name": "Chamomile tea"}]}))
                .into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
