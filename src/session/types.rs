use crate::types::{Identity, MfaChallenge};

/// Result of a successful login round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Password accepted; submit a one-time code with
    /// [`verify_mfa`](super::SessionManager::verify_mfa) next.
    MfaRequired(MfaChallenge),
    /// Session established. `redirect` is the role's landing route.
    Authenticated { identity: Identity, redirect: String },
}

impl LoginOutcome {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity, .. } => Some(identity),
            Self::MfaRequired(_) => None,
        }
    }

    /// Landing route, when the login completed.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::Authenticated { redirect, .. } => Some(redirect),
            Self::MfaRequired(_) => None,
        }
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&MfaChallenge> {
        match self {
            Self::MfaRequired(challenge) => Some(challenge),
            Self::Authenticated { .. } => None,
        }
    }
}
