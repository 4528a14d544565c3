use std::future::Future;

use crate::error::Error;
use crate::guard::LoginRedirect;
use crate::session::TokenGrant;
use crate::types::{AccessToken, Credentials, Principal, RefreshToken};

/// The four admin auth endpoints.
///
/// [`AuthClient`](crate::AuthClient) is the HTTP implementation. Tests and
/// alternative transports implement this directly.
pub trait AuthBackend: Send + Sync + 'static {
    /// Exchange credentials for a full token grant.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<TokenGrant, Error>> + Send;

    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// Implementations report a refused token as [`Error::RefreshRejected`].
    fn refresh(
        &self,
        refresh_token: &RefreshToken,
    ) -> impl Future<Output = Result<TokenGrant, Error>> + Send;

    /// Who-am-I: validates the access token and returns the current profile.
    fn me(
        &self,
        access_token: &AccessToken,
    ) -> impl Future<Output = Result<Principal, Error>> + Send;

    /// Revoke the session server-side.
    fn logout(&self, access_token: &AccessToken) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Host application navigation, used by the session guard.
///
/// Closures work too:
///
/// ```rust,ignore
/// let guard = SessionGuard::new(manager, |r: &LoginRedirect| router.replace(&r.location));
/// ```
pub trait Redirector: Send + Sync + 'static {
    /// Leave the current view for the login route. Must not prompt the user.
    fn redirect_to_login(&self, redirect: &LoginRedirect);
}

impl<F> Redirector for F
where
    F: Fn(&LoginRedirect) + Send + Sync + 'static,
{
    fn redirect_to_login(&self, redirect: &LoginRedirect) {
        self(redirect);
    }
}
