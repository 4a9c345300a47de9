/// Failures talking to the NUAM auth service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "client")]
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered with a non-2xx status.
    #[error("{operation} failed (status {status:?}): {detail}")]
    Api {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// A successful login response carried no user record.
    #[error("login response did not include the user identity")]
    MissingIdentity,

    /// A successful login response carried no access/refresh pair.
    #[error("login response did not include both access and refresh tokens")]
    MissingTokens,

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid RUT: {0}")]
    InvalidRut(String),
}

impl Error {
    /// True when the server understood the request and refused it
    /// (bad credentials, wrong code, expired token).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status: Some(400..=499), .. })
    }
}
