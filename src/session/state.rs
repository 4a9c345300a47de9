use crate::types::{Identity, MfaChallenge, Role};

/// Where the session is in the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Persisted credentials are still being checked with the server.
    Restoring,
    Anonymous,
    /// Password accepted, one-time code outstanding.
    AwaitingMfa,
    Authenticated,
}

/// Snapshot of the client session.
///
/// Only [`SessionManager`](super::SessionManager) produces these. `identity`
/// and `pending_challenge` are never both set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub(super) identity: Option<Identity>,
    pub(super) pending_challenge: Option<MfaChallenge>,
    pub(super) loading: bool,
}

impl Session {
    pub(super) fn restoring() -> Self {
        Self {
            identity: None,
            pending_challenge: None,
            loading: true,
        }
    }

    /// The signed-in user. Meaningless while [`is_loading`](Self::is_loading).
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|i| i.role)
    }

    #[must_use]
    pub fn pending_challenge(&self) -> Option<&MfaChallenge> {
        self.pending_challenge.as_ref()
    }

    /// True until the startup restore check has resolved.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Restoring
        } else if self.identity.is_some() {
            SessionPhase::Authenticated
        } else if self.pending_challenge.is_some() {
            SessionPhase::AwaitingMfa
        } else {
            SessionPhase::Anonymous
        }
    }

    pub(super) fn authenticate(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.pending_challenge = None;
    }

    pub(super) fn challenge(&mut self, challenge: MfaChallenge) {
        self.identity = None;
        self.pending_challenge = Some(challenge);
    }

    pub(super) fn clear(&mut self) {
        self.identity = None;
        self.pending_challenge = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TempToken;

    #[test]
    fn phases_follow_state() {
        let mut session = Session::restoring();
        assert_eq!(session.phase(), SessionPhase::Restoring);

        session.loading = false;
        assert_eq!(session.phase(), SessionPhase::Anonymous);

        session.challenge(MfaChallenge {
            temp_token: TempToken::from("T"),
        });
        assert_eq!(session.phase(), SessionPhase::AwaitingMfa);

        session.authenticate(Identity::new("alice", Role::Auditor));
        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert!(session.pending_challenge().is_none());
        assert_eq!(session.role(), Some(Role::Auditor));

        session.clear();
        assert_eq!(session.phase(), SessionPhase::Anonymous);
    }

    #[test]
    fn challenge_drops_identity() {
        let mut session = Session::restoring();
        session.loading = false;
        session.authenticate(Identity::new("alice", Role::Admin));

        session.challenge(MfaChallenge {
            temp_token: TempToken::from("T"),
        });

        assert!(session.identity().is_none());
        assert!(session.pending_challenge().is_some());
    }
}
