use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::expiry::parse_timestamp;
use crate::session::TokenGrant;
use crate::traits::AuthBackend;
use crate::types::{AccessToken, Credentials, Principal, RefreshToken};

const LOGIN: &str = "login";
const REFRESH: &str = "refresh";
const WHOAMI: &str = "whoami";
const LOGOUT: &str = "logout";

/// Admin auth API endpoints.
///
/// The base URL is a constructor parameter; endpoint paths default to the
/// `/auth/admin/*` routes and are relative to it.
///
/// ```rust,ignore
/// use admin_session::ApiConfig;
///
/// let config = ApiConfig::new("https://api.example.com/v1".parse()?)
///     .with_me_path("/auth/admin/profile");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) refresh_path: String,
    pub(crate) me_path: String,
    pub(crate) logout_path: String,
}

impl ApiConfig {
    /// Endpoints under `base_url` with the default `/auth/admin/*` paths.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            login_path: "/auth/admin/login".into(),
            refresh_path: "/auth/admin/refresh".into(),
            me_path: "/auth/admin/me".into(),
            logout_path: "/auth/admin/logout".into(),
        }
    }

    /// Override the login path.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Override the refresh path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the who-am-I path.
    #[must_use]
    pub fn with_me_path(mut self, path: impl Into<String>) -> Self {
        self.me_path = path.into();
        self
    }

    /// Override the logout path.
    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    /// API root every endpoint path is joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path against the base URL, keeping any path
    /// prefix the base URL carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL does not parse.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("endpoint {path}: {e}")))
    }
}

/// HTTP client for the admin auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl AuthClient {
    /// Client with a default `reqwest::Client`.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or timeouts).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Endpoint configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Underlying HTTP client, shared with callers that decorate their own
    /// requests.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Reads the body of a response, turning non-success statuses into the
    /// operation's rejection error.
    async fn read_body(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<String, Error> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(rejection(operation, Some(status.as_u16()), error_detail(&body)))
    }
}

impl AuthBackend for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, Error> {
        let url = self.config.endpoint(&self.config.login_path)?;
        let response = self.http.post(url).json(credentials).send().await?;
        let body = Self::read_body(response, LOGIN).await?;
        parse_grant(&body, LOGIN)
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenGrant, Error> {
        let mut url = self.config.endpoint(&self.config.refresh_path)?;
        url.query_pairs_mut()
            .append_pair("refresh_token", refresh_token.as_str());

        let response = self.http.post(url).send().await?;
        let body = Self::read_body(response, REFRESH).await?;
        parse_grant(&body, REFRESH)
    }

    async fn me(&self, access_token: &AccessToken) -> Result<Principal, Error> {
        let url = self.config.endpoint(&self.config.me_path)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token.as_str())
            .send()
            .await?;
        let body = Self::read_body(response, WHOAMI).await?;
        parse_principal(&body)
    }

    async fn logout(&self, access_token: &AccessToken) -> Result<(), Error> {
        let url = self.config.endpoint(&self.config.logout_path)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token.as_str())
            .send()
            .await?;
        Self::read_body(response, LOGOUT).await.map(drop)
    }
}

// ── Wire format ────────────────────────────────────────────────────

/// Expiry as sent by the backend: RFC 3339 text or Unix seconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Seconds(i64),
    Text(String),
}

impl WireTimestamp {
    fn resolve(self) -> Option<OffsetDateTime> {
        match self {
            Self::Seconds(secs) => OffsetDateTime::from_unix_timestamp(secs).ok(),
            Self::Text(raw) => parse_timestamp(&raw),
        }
    }
}

/// Login and refresh response body.
#[derive(Deserialize)]
struct GrantBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_token_expires_at: Option<WireTimestamp>,
    #[serde(default)]
    refresh_token_expires_at: Option<WireTimestamp>,
    #[serde(default)]
    admin: Option<JsonValue>,
}

fn parse_grant(body: &str, operation: &'static str) -> Result<TokenGrant, Error> {
    let body: GrantBody = serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
        operation,
        detail: e.to_string(),
    })?;

    if body.success == Some(false) {
        let detail = body.message.unwrap_or_else(|| "success: false".into());
        return Err(rejection(operation, None, detail));
    }

    let missing = |field: &str| Error::MalformedResponse {
        operation,
        detail: format!("missing or invalid {field}"),
    };

    Ok(TokenGrant {
        access_token: body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("access_token"))?
            .into(),
        access_token_expires_at: body
            .access_token_expires_at
            .and_then(WireTimestamp::resolve)
            .ok_or_else(|| missing("access_token_expires_at"))?,
        refresh_token: body
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("refresh_token"))?
            .into(),
        refresh_token_expires_at: body
            .refresh_token_expires_at
            .and_then(WireTimestamp::resolve)
            .ok_or_else(|| missing("refresh_token_expires_at"))?,
        principal: body.admin.filter(|v| !v.is_null()).map(Principal),
    })
}

/// Who-am-I body: `{ success, ...profile }`, with the profile either inline
/// or nested under `admin` / `data`.
fn parse_principal(body: &str) -> Result<Principal, Error> {
    let mut value: JsonValue = serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
        operation: WHOAMI,
        detail: e.to_string(),
    })?;

    let Some(object) = value.as_object_mut() else {
        return Err(Error::MalformedResponse {
            operation: WHOAMI,
            detail: "expected a JSON object".into(),
        });
    };

    if object.get("success").and_then(JsonValue::as_bool) == Some(false) {
        let detail = object
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or("success: false")
            .to_owned();
        return Err(rejection(WHOAMI, None, detail));
    }

    for nested in ["admin", "data"] {
        if let Some(inner) = object.get(nested).filter(|v| v.is_object()) {
            return Ok(Principal(inner.clone()));
        }
    }

    object.remove("success");
    Ok(Principal(value))
}

fn rejection(operation: &'static str, status: Option<u16>, detail: String) -> Error {
    if operation == REFRESH {
        Error::RefreshRejected { status, detail }
    } else {
        Error::Rejected {
            operation,
            status,
            detail,
        }
    }
}

/// Pulls a human-readable message out of an error body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            ["message", "detail", "error"]
                .into_iter()
                .find_map(|k| v.get(k).and_then(JsonValue::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| body.to_owned())
}
