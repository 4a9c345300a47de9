/// Session manager errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The auth service failed or refused the request.
    #[error(transparent)]
    Transport(#[from] crate::error::Error),

    /// The operation needs an authenticated session.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A one-time code was submitted with no outstanding challenge.
    #[error("No MFA challenge pending")]
    NoPendingChallenge,

    /// Another login or code verification is still awaiting the server.
    #[error("A login attempt is already in progress")]
    LoginInFlight,

    /// Token store operation failed.
    #[error("Token store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// True when the server refused the request (wrong password, wrong code).
    ///
    /// The view layer shows "invalid credentials" / "invalid code" for these
    /// and a generic failure for everything else.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_rejection())
    }
}
