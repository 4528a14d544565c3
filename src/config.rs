use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::api::{ApiConfig, AuthClient};
use crate::error::Error;
use crate::guard::{DEFAULT_REVALIDATE_INTERVAL, GuardSettings};
use crate::store::FileTokenStore;

const DEFAULT_SESSION_FILE: &str = "admin_session.json";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin session configuration.
///
/// Required field (`api_base_url`) is a constructor parameter.
///
/// Use [`from_env()`](SessionConfig::from_env) for convention-based setup,
/// or [`new()`](SessionConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    api: ApiConfig,
    session_file: PathBuf,
    login_route: String,
    revalidate_interval: Duration,
    http_timeout: Duration,
}

impl SessionConfig {
    /// Defaults for everything except the API root.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api: ApiConfig::new(api_base_url),
            session_file: DEFAULT_SESSION_FILE.into(),
            login_route: "/login".into(),
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `ADMIN_API_URL`: base URL of the admin API
    ///
    /// # Optional env vars
    /// - `ADMIN_SESSION_FILE`: where the session is persisted (default `admin_session.json`)
    /// - `ADMIN_LOGIN_ROUTE`: route the guard redirects to (default `/login`)
    /// - `ADMIN_SESSION_CHECK_SECS`: revalidation interval in seconds (default 300)
    /// - `ADMIN_HTTP_TIMEOUT_SECS`: per-request timeout in seconds (default 30)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required values are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base = lookup("ADMIN_API_URL")
            .ok_or_else(|| Error::Config("ADMIN_API_URL is required".into()))?;
        let base: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("ADMIN_API_URL: {e}")))?;

        let mut config = Self::new(base);

        if let Some(path) = lookup("ADMIN_SESSION_FILE") {
            config = config.with_session_file(path);
        }
        if let Some(route) = lookup("ADMIN_LOGIN_ROUTE") {
            config = config.with_login_route(route);
        }
        if let Some(secs) = lookup("ADMIN_SESSION_CHECK_SECS") {
            let interval = parse_secs("ADMIN_SESSION_CHECK_SECS", &secs)?;
            config = config.with_revalidate_interval(interval);
        }
        if let Some(secs) = lookup("ADMIN_HTTP_TIMEOUT_SECS") {
            config = config.with_http_timeout(parse_secs("ADMIN_HTTP_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }

    /// Override endpoint paths and other API settings.
    #[must_use]
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Set the session file location.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Set the login route used by the guard.
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Set the guard revalidation period.
    #[must_use]
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Admin API endpoints.
    #[must_use]
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Where the session document lives.
    #[must_use]
    pub fn session_file(&self) -> &std::path::Path {
        &self.session_file
    }

    /// Login route used by the guard.
    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Guard revalidation period.
    #[must_use]
    pub fn revalidate_interval(&self) -> Duration {
        self.revalidate_interval
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// HTTP auth client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn auth_client(&self) -> Result<AuthClient, Error> {
        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()?;
        Ok(AuthClient::new(self.api.clone()).with_http_client(http))
    }

    /// File-backed token store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if an existing session file cannot be read.
    pub fn file_store(&self) -> Result<FileTokenStore, Error> {
        FileTokenStore::open(&self.session_file)
    }

    /// Guard settings from this configuration.
    #[must_use]
    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            login_route: self.login_route.clone(),
            revalidate_interval: self.revalidate_interval,
        }
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration, Error> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{name} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(Error::Config(format!("{name}: {e}"))),
    }
}
