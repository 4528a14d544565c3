/// Errors from session and token operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No access token is stored, so there is no session to validate.
    #[error("not authenticated")]
    Unauthenticated,

    /// Refresh was attempted with no refresh token in the store.
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// The backend refused to mint a new token pair.
    #[error("refresh rejected (status {status:?}): {detail}")]
    RefreshRejected { status: Option<u16>, detail: String },

    /// Login, who-am-I or logout returned a non-success response.
    #[error("{operation} rejected (status {status:?}): {detail}")]
    Rejected {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was missing fields or was not the expected JSON.
    #[error("malformed {operation} response: {detail}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
    },

    #[error("token store error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the current session is dead and the user
    /// must log in again.
    ///
    /// Network failures count: a session that cannot be confirmed is not
    /// assumed valid.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Config(_))
    }

    /// HTTP status attached to the error, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RefreshRejected { status, .. } | Self::Rejected { status, .. } => *status,
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
