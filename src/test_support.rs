//! Scripted in-memory backend for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use time::OffsetDateTime;

use crate::error::Error;
use crate::session::TokenGrant;
use crate::traits::AuthBackend;
use crate::types::{AccessToken, Credentials, Principal, RefreshToken};

/// Scripted answer for one backend endpoint.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Grant(TokenGrant),
    Principal(Principal),
    Ok,
    Status(u16),
    Malformed,
}

/// Access token valid for ten more minutes; no principal.
pub(crate) fn fresh_grant(access: &str, refresh: &str) -> TokenGrant {
    let now = OffsetDateTime::now_utc();
    TokenGrant {
        access_token: access.into(),
        access_token_expires_at: now + time::Duration::minutes(10),
        refresh_token: refresh.into(),
        refresh_token_expires_at: now + time::Duration::days(7),
        principal: None,
    }
}

/// Access token that expired a minute ago, refresh token still valid.
pub(crate) fn expired_grant(access: &str, refresh: &str) -> TokenGrant {
    let now = OffsetDateTime::now_utc();
    TokenGrant {
        access_token: access.into(),
        access_token_expires_at: now - time::Duration::minutes(1),
        refresh_token: refresh.into(),
        refresh_token_expires_at: now + time::Duration::days(7),
        principal: Some(json!({"name": "Ada", "email": "ada@example.com"}).into()),
    }
}

#[derive(Debug)]
pub(crate) struct FakeBackend {
    login: Outcome,
    refresh: Outcome,
    me: Outcome,
    logout: Outcome,
    refresh_delay: Option<Duration>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    me_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
    last_me_token: Mutex<Option<String>>,
    last_logout_token: Mutex<Option<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        let mut login = fresh_grant("T-login", "R-login");
        login.principal = Some(json!({"name": "Ada", "email": "ada@example.com"}).into());
        Self {
            login: Outcome::Grant(login),
            refresh: Outcome::Grant(fresh_grant("T-refreshed", "R-refreshed")),
            me: Outcome::Principal(json!({"name": "Ada"}).into()),
            logout: Outcome::Ok,
            refresh_delay: None,
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
            last_me_token: Mutex::new(None),
            last_logout_token: Mutex::new(None),
        }
    }

    pub(crate) fn with_login(mut self, outcome: Outcome) -> Self {
        self.login = outcome;
        self
    }

    pub(crate) fn with_refresh(mut self, outcome: Outcome) -> Self {
        self.refresh = outcome;
        self
    }

    pub(crate) fn with_me(mut self, outcome: Outcome) -> Self {
        self.me = outcome;
        self
    }

    pub(crate) fn with_logout(mut self, outcome: Outcome) -> Self {
        self.logout = outcome;
        self
    }

    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.login_calls() + self.refresh_calls() + self.me_calls() + self.logout_calls()
    }

    pub(crate) fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }

    pub(crate) fn last_me_token(&self) -> Option<String> {
        self.last_me_token.lock().clone()
    }

    pub(crate) fn last_logout_token(&self) -> Option<String> {
        self.last_logout_token.lock().clone()
    }
}

fn fail(operation: &'static str, outcome: &Outcome) -> Error {
    match outcome {
        Outcome::Status(status) if operation == "refresh" => Error::RefreshRejected {
            status: Some(*status),
            detail: "rejected".into(),
        },
        Outcome::Status(status) => Error::Rejected {
            operation,
            status: Some(*status),
            detail: "rejected".into(),
        },
        _ => Error::MalformedResponse {
            operation,
            detail: "unexpected body".into(),
        },
    }
}

fn grant(operation: &'static str, outcome: &Outcome) -> Result<TokenGrant, Error> {
    match outcome {
        Outcome::Grant(grant) => Ok(grant.clone()),
        other => Err(fail(operation, other)),
    }
}

impl AuthBackend for FakeBackend {
    async fn login(&self, _credentials: &Credentials) -> Result<TokenGrant, Error> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        grant("login", &self.login)
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenGrant, Error> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = Some(refresh_token.as_str().to_owned());
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        grant("refresh", &self.refresh)
    }

    async fn me(&self, access_token: &AccessToken) -> Result<Principal, Error> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_me_token.lock() = Some(access_token.as_str().to_owned());
        match &self.me {
            Outcome::Principal(p) => Ok(p.clone()),
            other => Err(fail("whoami", other)),
        }
    }

    async fn logout(&self, access_token: &AccessToken) -> Result<(), Error> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_logout_token.lock() = Some(access_token.as_str().to_owned());
        match &self.logout {
            Outcome::Ok => Ok(()),
            other => Err(fail("logout", other)),
        }
    }
}
