//! Session guard: keeps protected views behind a validated session.
//!
//! ```text
//!                  mount / timer tick
//!  Unauthenticated ─────────────────▶ Validating ──ok──▶ Authenticated
//!        ▲                                │                   │
//!        └──────────── fail (redirect) ◀──┘◀──── timer tick ──┘
//! ```
//!
//! `Unauthenticated` after a failure is terminal: the guard redirects once
//! and stops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::manager::{SessionEndReason, SessionEvent, SessionManager};
use crate::store::TokenStore;
use crate::traits::{AuthBackend, Redirector};

/// Default revalidation period.
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Where the guard stands with respect to the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No confirmed session. Initial state, and terminal after a redirect.
    Unauthenticated,
    /// A refresh or who-am-I check is in flight.
    Validating,
    /// The session was confirmed; protected content may render.
    Authenticated,
}

/// Where and why the guard sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Login route, with `?error=<code>` when the session ended abnormally.
    pub location: String,
    /// Why the session ended.
    pub reason: SessionEndReason,
}

impl LoginRedirect {
    /// Build the redirect for `reason`. Never-logged-in and logged-out
    /// sessions go to the bare route.
    #[must_use]
    pub fn new(login_route: &str, reason: SessionEndReason) -> Self {
        let location = match reason {
            SessionEndReason::NoSession | SessionEndReason::LoggedOut => login_route.to_owned(),
            _ => {
                let encoded = urlencoding::encode(reason.code());
                format!("{login_route}?error={encoded}")
            }
        };
        Self { location, reason }
    }
}

/// Guard tunables.
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Route the user is sent to when the session ends. Defaults to `/login`.
    pub login_route: String,
    /// Period between who-am-I checks. Defaults to five minutes.
    pub revalidate_interval: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            login_route: "/login".into(),
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
        }
    }
}

/// Gate for protected views. See the module docs for the state machine.
pub struct SessionGuard<S, B, R> {
    manager: SessionManager<S, B>,
    redirector: Arc<R>,
    settings: GuardSettings,
    state: GuardState,
    mounted: bool,
    redirected: bool,
}

impl<S, B, R> std::fmt::Debug for SessionGuard<S, B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("redirected", &self.redirected)
            .finish_non_exhaustive()
    }
}

impl<S: TokenStore, B: AuthBackend, R: Redirector> SessionGuard<S, B, R> {
    /// Create an unmounted guard with default settings.
    #[must_use]
    pub fn new(manager: SessionManager<S, B>, redirector: R) -> Self {
        Self {
            manager,
            redirector: Arc::new(redirector),
            settings: GuardSettings::default(),
            state: GuardState::Unauthenticated,
            mounted: false,
            redirected: false,
        }
    }

    /// Replace all settings at once.
    #[must_use]
    pub fn with_settings(mut self, settings: GuardSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the login route.
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.settings.login_route = route.into();
        self
    }

    /// Set the revalidation period.
    #[must_use]
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.settings.revalidate_interval = interval;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Whether the guard has already sent the user to the login route.
    #[must_use]
    pub fn has_redirected(&self) -> bool {
        self.redirected
    }

    /// Mount-time check.
    ///
    /// No stored access token redirects immediately without any network
    /// call. A partial session is cleared and redirects, also without any
    /// network call. A fresh, complete session is accepted as is. A complete
    /// but expired one gets exactly one refresh attempt.
    pub async fn mount(&mut self) -> GuardState {
        self.mounted = true;
        if self.redirected {
            return self.state;
        }

        let session = self.manager.session();
        if session.access_token.is_none() {
            return self.fail(SessionEndReason::NoSession);
        }
        if !session.is_complete() {
            self.manager.end_session(SessionEndReason::PartialSession).await;
            return self.fail(SessionEndReason::PartialSession);
        }
        if session.has_fresh_access_token() {
            return self.transition(GuardState::Authenticated);
        }

        self.transition(GuardState::Validating);
        match self.manager.refresh().await {
            Ok(_) => self.transition(GuardState::Authenticated),
            Err(e) => {
                tracing::info!(error = %e, "Session could not be restored on mount");
                self.fail(SessionEndReason::RefreshFailed)
            }
        }
    }

    /// Periodic check through the who-am-I endpoint.
    pub async fn revalidate(&mut self) -> GuardState {
        if self.redirected {
            return self.state;
        }

        self.transition(GuardState::Validating);
        match self.manager.whoami().await {
            Ok(_) => self.transition(GuardState::Authenticated),
            Err(e) => {
                tracing::info!(error = %e, "Session revalidation failed");
                self.fail(SessionEndReason::SessionRejected)
            }
        }
    }

    /// Run the guard in the background: mount (if not done yet), then
    /// revalidate on every interval tick, and redirect as soon as any request
    /// invalidates the session.
    ///
    /// Dropping the returned handle stops the timer.
    #[must_use = "dropping the handle stops the guard"]
    pub fn spawn(self) -> GuardHandle {
        // Subscribe before the task starts so no invalidation is missed.
        let events = self.manager.subscribe();
        GuardHandle {
            task: Some(tokio::spawn(self.run(events))),
        }
    }

    async fn run(mut self, mut events: broadcast::Receiver<SessionEvent>) -> GuardState {
        if !self.mounted {
            self.mount().await;
        }

        let period = self.settings.revalidate_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.redirected {
            tokio::select! {
                _ = ticker.tick() => {
                    self.revalidate().await;
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::Invalidated { reason }) => {
                        self.fail(reason);
                    }
                    Ok(SessionEvent::LoggedOut) => {
                        self.fail(SessionEndReason::LoggedOut);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Session guard lagged behind events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        self.state
    }

    fn transition(&mut self, next: GuardState) -> GuardState {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "Session guard transition");
        }
        self.state = next;
        next
    }

    fn fail(&mut self, reason: SessionEndReason) -> GuardState {
        self.transition(GuardState::Unauthenticated);
        if !self.redirected {
            self.redirected = true;
            let redirect = LoginRedirect::new(&self.settings.login_route, reason);
            tracing::info!(
                location = %redirect.location,
                reason = reason.code(),
                "Redirecting to login"
            );
            self.redirector.redirect_to_login(&redirect);
        }
        GuardState::Unauthenticated
    }
}

/// Background guard task. Dropping it aborts the task and its timer.
#[derive(Debug)]
pub struct GuardHandle {
    task: Option<JoinHandle<GuardState>>,
}

impl GuardHandle {
    /// Stop the guard (view teardown).
    pub fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the guard has stopped on its own (after redirecting).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the guard to stop on its own; returns its final state.
    pub async fn finished(mut self) -> Option<GuardState> {
        let task = self.task.take()?;
        task.await.ok()
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
