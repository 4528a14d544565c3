use time::OffsetDateTime;

use crate::expiry;
use crate::types::{AccessToken, Principal, RefreshToken};

/// Token pair minted by the backend on login or refresh.
///
/// Every credential field is required: a response that cannot fill all four
/// is rejected as malformed before it reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    /// Bearer credential for API calls.
    pub access_token: AccessToken,
    /// Instant after which the access token is no longer accepted.
    pub access_token_expires_at: OffsetDateTime,
    /// Credential exchanged for a new pair.
    pub refresh_token: RefreshToken,
    /// Instant after which the refresh token is no longer accepted.
    pub refresh_token_expires_at: OffsetDateTime,
    /// Present on login; the refresh endpoint may omit it.
    pub principal: Option<Principal>,
}

/// The admin session as read back from the token store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Bearer credential, if stored.
    pub access_token: Option<AccessToken>,
    /// Access token expiry; unparsable values read as `None`.
    pub access_token_expires_at: Option<OffsetDateTime>,
    /// Refresh credential, if stored.
    pub refresh_token: Option<RefreshToken>,
    /// Refresh token expiry.
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    /// Cached admin profile.
    pub principal: Option<Principal>,
}

impl Session {
    /// No credential field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.access_token_expires_at.is_none()
            && self.refresh_token.is_none()
            && self.refresh_token_expires_at.is_none()
    }

    /// All four credential fields are set. Anything between empty and
    /// complete is a partial session and forces re-login.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some()
            && self.access_token_expires_at.is_some()
            && self.refresh_token.is_some()
            && self.refresh_token_expires_at.is_some()
    }

    /// Access token present and not yet expired at `now`.
    #[must_use]
    pub fn has_fresh_access_token_at(&self, now: OffsetDateTime) -> bool {
        self.access_token.is_some() && !expiry::is_expired_at(self.access_token_expires_at, now)
    }

    /// Access token present and not yet expired.
    #[must_use]
    pub fn has_fresh_access_token(&self) -> bool {
        self.has_fresh_access_token_at(OffsetDateTime::now_utc())
    }
}

impl From<TokenGrant> for Session {
    fn from(grant: TokenGrant) -> Self {
        Self {
            access_token: Some(grant.access_token),
            access_token_expires_at: Some(grant.access_token_expires_at),
            refresh_token: Some(grant.refresh_token),
            refresh_token_expires_at: Some(grant.refresh_token_expires_at),
            principal: grant.principal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn grant(expires_at: OffsetDateTime) -> TokenGrant {
        TokenGrant {
            access_token: "A1".into(),
            access_token_expires_at: expires_at,
            refresh_token: "R1".into(),
            refresh_token_expires_at: expires_at + Duration::days(7),
            principal: None,
        }
    }

    #[test]
    fn default_session_is_empty() {
        let s = Session::default();
        assert!(s.is_empty());
        assert!(!s.is_complete());
        assert!(!s.has_fresh_access_token());
    }

    #[test]
    fn grant_becomes_complete_session() {
        let s = Session::from(grant(datetime!(2030-01-01 0:00 UTC)));
        assert!(s.is_complete());
        assert!(!s.is_empty());
        assert_eq!(s.access_token, Some(AccessToken::from("A1")));
    }

    #[test]
    fn partial_session_is_neither_empty_nor_complete() {
        let s = Session {
            access_token: Some("A1".into()),
            access_token_expires_at: Some(datetime!(2030-01-01 0:00 UTC)),
            ..Session::default()
        };
        assert!(!s.is_empty());
        assert!(!s.is_complete());
    }

    #[test]
    fn freshness_follows_access_expiry() {
        let now = datetime!(2025-06-01 12:00 UTC);
        let fresh = Session::from(grant(now + Duration::minutes(10)));
        let stale = Session::from(grant(now - Duration::minutes(1)));
        assert!(fresh.has_fresh_access_token_at(now));
        assert!(!stale.has_fresh_access_token_at(now));
    }

    #[test]
    fn token_without_expiry_is_not_fresh() {
        let s = Session {
            access_token: Some("A1".into()),
            ..Session::default()
        };
        assert!(!s.has_fresh_access_token());
    }
}
