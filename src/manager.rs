use std::sync::Arc;

use reqwest::header::HeaderValue;
use tokio::sync::{Mutex, broadcast};

use crate::error::Error;
use crate::expiry::is_expired;
use crate::session::Session;
use crate::store::TokenStore;
use crate::traits::AuthBackend;
use crate::types::{AccessToken, Credentials, Principal};

const EVENT_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEndReason {
    /// Nothing was ever stored.
    NoSession,
    /// Some credential keys were present but not all four.
    PartialSession,
    /// A refresh was needed but no refresh token was stored.
    NoRefreshToken,
    /// The refresh call failed: rejected, unreachable, or malformed.
    RefreshFailed,
    /// Who-am-I reported the session invalid (or could not confirm it).
    SessionRejected,
    /// The admin logged out explicitly.
    LoggedOut,
}

impl SessionEndReason {
    /// Short machine-readable code, used in login redirects.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::PartialSession => "partial_session",
            Self::NoRefreshToken => "no_refresh_token",
            Self::RefreshFailed => "session_expired",
            Self::SessionRejected => "session_invalid",
            Self::LoggedOut => "logged_out",
        }
    }
}

/// Session lifecycle notifications, delivered to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A login stored a new grant.
    LoggedIn,
    /// A refresh replaced the token pair.
    Refreshed,
    /// The store was cleared because the session is no longer usable.
    Invalidated { reason: SessionEndReason },
    /// An explicit logout cleared the store.
    LoggedOut,
}

/// Owns the token lifecycle: login, refresh, request authorization, logout.
///
/// Cheap to clone; clones share the store, backend, refresh lock and event
/// channel.
///
/// ```rust,ignore
/// let manager = SessionManager::new(FileTokenStore::open("session.json")?, client);
/// manager.login(&Credentials::new("admin@example.com", "secret")).await?;
///
/// let request = manager.decorate(http.get(products_url)).await?;
/// let products = request.send().await?;
/// ```
pub struct SessionManager<S, B> {
    store: Arc<S>,
    backend: Arc<B>,
    /// Held by every refresh and every clear, so a refresh in flight can
    /// never write tokens back after the session was ended.
    refresh_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<SessionEvent>,
}

// Manual Clone: avoid derive adding `S: Clone, B: Clone` bounds.
impl<S, B> Clone for SessionManager<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            backend: self.backend.clone(),
            refresh_lock: self.refresh_lock.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S, B> std::fmt::Debug for SessionManager<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl<S: TokenStore, B: AuthBackend> SessionManager<S, B> {
    /// Create a manager owning `store` and `backend`.
    #[must_use]
    pub fn new(store: S, backend: B) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(backend))
    }

    /// Build from an already shared store and backend.
    #[must_use]
    pub fn from_shared(store: Arc<S>, backend: Arc<B>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            backend,
            refresh_lock: Arc::new(Mutex::new(())),
            events,
        }
    }

    /// The token store backing this session.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The admin API client.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current session as persisted.
    #[must_use]
    pub fn session(&self) -> Session {
        self.store.session()
    }

    /// Cached profile of the signed-in admin, for display.
    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.store.session().principal
    }

    /// Receive every [`SessionEvent`] emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Log in and persist the full grant.
    ///
    /// # Errors
    ///
    /// Returns the backend error for display on the login form, or
    /// [`Error::Storage`] if the grant cannot be persisted. A failed login
    /// leaves the store empty.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, Error> {
        let outcome = self.backend.login(credentials).await;
        let _in_flight = self.refresh_lock.lock().await;
        match outcome {
            Ok(grant) => {
                self.store.set_all(&grant)?;
                tracing::info!(email = %credentials.email, "Admin login successful");
                self.emit(SessionEvent::LoggedIn);
                Ok(Session::from(grant))
            }
            Err(e) => {
                tracing::warn!(email = %credentials.email, error = %e, "Admin login failed");
                if let Err(clear_err) = self.store.clear() {
                    tracing::error!(
                        error = %clear_err,
                        "Failed to clear token store after login failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Always performs the network call when a refresh token is stored; use
    /// [`authorize`](Self::authorize) to refresh only when needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] without any network call when no
    /// refresh token is stored. Any failure clears the whole store first.
    pub async fn refresh(&self) -> Result<Session, Error> {
        let _in_flight = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Session, Error> {
        let current = self.store.session();
        let Some(refresh_token) = current.refresh_token else {
            tracing::warn!("Refresh attempted without a refresh token");
            self.invalidate(SessionEndReason::NoRefreshToken);
            return Err(Error::NoRefreshToken);
        };

        let mut grant = match self.backend.refresh(&refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                self.invalidate(SessionEndReason::RefreshFailed);
                return Err(e);
            }
        };

        if grant.principal.is_none() {
            grant.principal = current.principal;
        }
        if let Err(e) = self.store.set_all(&grant) {
            tracing::error!(error = %e, "Failed to persist refreshed tokens");
            self.invalidate(SessionEndReason::RefreshFailed);
            return Err(e);
        }

        tracing::debug!(expires_at = %grant.access_token_expires_at, "Access token refreshed");
        self.emit(SessionEvent::Refreshed);
        Ok(Session::from(grant))
    }

    /// Resolve the access token to attach to an outgoing request.
    ///
    /// - no stored access token: `Ok(None)`, the request goes out
    ///   unauthenticated;
    /// - fresh token: returned as is, no network call;
    /// - expired token: refreshed first. Concurrent callers share a single
    ///   refresh.
    ///
    /// Completes before the caller dispatches its request.
    ///
    /// # Errors
    ///
    /// Returns the refresh error when the token was expired and could not be
    /// refreshed. The store is cleared and subscribers receive
    /// [`SessionEvent::Invalidated`]; the caller should abandon the request.
    pub async fn authorize(&self) -> Result<Option<AccessToken>, Error> {
        let session = self.store.session();
        let Some(token) = session.access_token else {
            return Ok(None);
        };
        if !is_expired(session.access_token_expires_at) {
            return Ok(Some(token));
        }

        let _in_flight = self.refresh_lock.lock().await;

        // Another caller may have refreshed, or ended the session, while we
        // waited for the lock. A failed refresh has already been reported.
        let session = self.store.session();
        if session.access_token.is_none() {
            return Err(Error::Unauthenticated);
        }
        if session.has_fresh_access_token() {
            return Ok(session.access_token);
        }

        let refreshed = self.refresh_locked().await?;
        Ok(refreshed.access_token)
    }

    /// `Authorization: Bearer <token>` for the current session, if any.
    ///
    /// # Errors
    ///
    /// Same as [`authorize`](Self::authorize); also fails with
    /// [`Error::MalformedResponse`] if the stored token is not a valid
    /// header value.
    pub async fn authorization_header(&self) -> Result<Option<HeaderValue>, Error> {
        let Some(token) = self.authorize().await? else {
            return Ok(None);
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str())).map_err(
            |e| Error::MalformedResponse {
                operation: "authorize",
                detail: e.to_string(),
            },
        )?;
        value.set_sensitive(true);
        Ok(Some(value))
    }

    /// Attach credentials to a request before it is sent.
    ///
    /// # Errors
    ///
    /// Same as [`authorize`](Self::authorize).
    pub async fn decorate(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        Ok(match self.authorize().await? {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        })
    }

    /// Validate the session against the backend's who-am-I endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] when no token is stored, the
    /// refresh error when an expired token could not be refreshed, or the
    /// backend error. Every failure clears the store.
    pub async fn whoami(&self) -> Result<Principal, Error> {
        let Some(token) = self.authorize().await? else {
            self.end_session(SessionEndReason::NoSession).await;
            return Err(Error::Unauthenticated);
        };

        match self.backend.me(&token).await {
            Ok(principal) => Ok(principal),
            Err(e) => {
                tracing::warn!(error = %e, "Session validation failed");
                self.end_session(SessionEndReason::SessionRejected).await;
                Err(e)
            }
        }
    }

    /// Log out. The store is cleared whatever the backend answers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] only if the store cannot be cleared.
    pub async fn logout(&self) -> Result<(), Error> {
        // Waits out a refresh in flight; its tokens are revoked below.
        let _in_flight = self.refresh_lock.lock().await;
        if let Some(token) = self.store.session().access_token {
            if let Err(e) = self.backend.logout(&token).await {
                tracing::warn!(error = %e, "Logout request failed");
            }
        }

        self.store.clear()?;
        tracing::info!("Admin logged out");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// End the session outside of a refresh: clear every key and tell
    /// subscribers why.
    ///
    /// Waits for a refresh in flight to settle first, so its result cannot
    /// resurrect the session afterwards.
    pub async fn end_session(&self, reason: SessionEndReason) {
        let _in_flight = self.refresh_lock.lock().await;
        self.invalidate(reason);
    }

    /// Caller must hold `refresh_lock`.
    fn invalidate(&self, reason: SessionEndReason) {
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear token store");
        }
        tracing::info!(reason = reason.code(), "Session invalidated");
        self.emit(SessionEvent::Invalidated { reason });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
