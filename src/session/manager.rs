use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use super::config::SessionConfig;
use super::error::AuthError;
use super::guard::{self, RouteDecision};
use super::menu::{self, NavItem};
use super::state::Session;
use super::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use super::traits::{AuthApi, TokenStore};
use super::types::LoginOutcome;
use crate::types::{
    AccessToken, Credentials, Identity, LoginResponse, MfaEnrollment, NewAccount, RefreshToken,
    TempToken,
};

/// Client session state and the operations that move it.
///
/// Lifecycle is `new` → [`initialize`](Self::initialize) → … →
/// [`dispose`](Self::dispose). Share it by reference (or `Arc`) with the
/// view layer; [`subscribe`](Self::subscribe) yields every state change.
pub struct SessionManager<A, S> {
    api: A,
    store: S,
    config: SessionConfig,
    state: watch::Sender<Session>,
    initialized: AtomicBool,
    login_in_flight: AtomicBool,
}

/// Releases the in-flight flag on every exit path of a login round trip.
struct AttemptGuard<'a>(&'a AtomicBool);

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: AuthApi, S: TokenStore> SessionManager<A, S> {
    /// Create a manager in the `Restoring` phase. Nothing is read or sent
    /// until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(api: A, store: S, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(Session::restoring());
        Self {
            api,
            store,
            config,
            state,
            initialized: AtomicBool::new(false),
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Protected-route decision for the current session.
    #[must_use]
    pub fn guard(&self) -> RouteDecision {
        guard::guard(&self.state.borrow(), &self.config.login_route)
    }

    /// Entries of `items` the signed-in user's role may see.
    #[must_use]
    pub fn menu<'a>(&self, items: &'a [NavItem]) -> Vec<&'a NavItem> {
        menu::visible_items(items, self.state.borrow().role())
    }

    /// Resolve persisted credentials with the server. Runs once; later calls
    /// return immediately.
    ///
    /// With a stored access token, `auth/me/` decides: success restores the
    /// session, any failure clears the stored tokens. Without one, no request
    /// is made. `loading` turns false when this returns.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }

        let identity = self.restore().await;

        self.state.send_modify(|session| {
            session.loading = false;
            if let Some(identity) = identity {
                session.authenticate(identity);
            }
        });
    }

    async fn restore(&self) -> Option<Identity> {
        let access = match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => AccessToken::from(token),
            Ok(None) => {
                tracing::debug!("No stored session");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token store read failed; starting anonymous");
                self.clear_tokens();
                return None;
            }
        };

        match self.api.me(&access).await {
            Ok(identity) => {
                tracing::info!(
                    username = %identity.username,
                    role = %identity.role,
                    "Session restored"
                );
                Some(identity)
            }
            Err(e) => {
                // A login that finished while `me` was pending owns the store now.
                match self.store.get(ACCESS_TOKEN_KEY) {
                    Ok(Some(current)) if current != access.as_str() => {
                        tracing::debug!(error = %e, "Stored session was replaced during restore");
                    }
                    _ => {
                        tracing::warn!(error = %e, "Session restore failed; clearing stored tokens");
                        self.clear_tokens();
                    }
                }
                None
            }
        }
    }

    /// Password login, step 1.
    ///
    /// Returns [`LoginOutcome::MfaRequired`] when the account has a second
    /// factor; nothing is persisted until the code is verified. Otherwise the
    /// session is established and the outcome carries the landing route.
    ///
    /// # Errors
    ///
    /// - [`AuthError::LoginInFlight`] if another login/verify is pending
    /// - [`AuthError::Transport`] if the server rejects the credentials, is
    ///   unreachable, or grants a session without a user record
    /// - [`AuthError::Store`] if the tokens cannot be persisted
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let _attempt = self.begin_attempt()?;

        let response = self.api.login(username, password).await.map_err(|e| {
            tracing::error!(error = %e, username, "Login failed");
            AuthError::from(e)
        })?;

        if response.mfa_required {
            let challenge = response.into_challenge().map_err(|e| {
                tracing::error!(error = %e, username, "Malformed MFA challenge");
                AuthError::from(e)
            })?;

            // A new login abandons whatever session was active.
            self.clear_tokens();
            self.state.send_modify(|session| session.challenge(challenge.clone()));
            tracing::info!(username, "Password accepted; MFA code required");
            return Ok(LoginOutcome::MfaRequired(challenge));
        }

        self.complete_login(response)
    }

    /// Login step 2 against the pending challenge.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoPendingChallenge`] without a challenge; otherwise as
    /// [`verify_mfa_with`](Self::verify_mfa_with).
    pub async fn verify_mfa(&self, code: &str) -> Result<LoginOutcome, AuthError> {
        let challenge = self
            .session()
            .pending_challenge
            .ok_or(AuthError::NoPendingChallenge)?;
        self.verify_mfa_with(code, &challenge.temp_token).await
    }

    /// Login step 2 with an explicit `temp_token`.
    ///
    /// On failure the pending challenge is kept so the user can retry the
    /// code without re-entering the password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::LoginInFlight`] if another login/verify is pending
    /// - [`AuthError::Transport`] on an invalid or expired code
    /// - [`AuthError::Store`] if the tokens cannot be persisted
    pub async fn verify_mfa_with(
        &self,
        code: &str,
        temp_token: &TempToken,
    ) -> Result<LoginOutcome, AuthError> {
        let _attempt = self.begin_attempt()?;

        let response = self.api.verify_login(temp_token, code).await.map_err(|e| {
            tracing::error!(error = %e, "MFA verification failed");
            AuthError::from(e)
        })?;

        self.complete_login(response)
    }

    /// End the session locally. Always succeeds; returns the login route.
    pub fn logout(&self) -> &str {
        self.clear_tokens();

        let changed = self.state.send_if_modified(|session| {
            let active = session.identity.is_some() || session.pending_challenge.is_some();
            session.clear();
            active
        });
        if changed {
            tracing::info!("Logged out");
        }

        &self.config.login_route
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure ends the session: a rejected or unreachable refresh, or
    /// new tokens that cannot be saved.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no refresh token is stored
    /// - [`AuthError::Transport`] if the server is unreachable or rejects it
    /// - [`AuthError::Store`] if the new tokens cannot be persisted
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh = self
            .stored(REFRESH_TOKEN_KEY)?
            .map(RefreshToken::from)
            .ok_or(AuthError::Unauthenticated)?;

        let tokens = match self.api.refresh(&refresh).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                self.logout();
                return Err(e.into());
            }
        };

        let credentials = Credentials {
            access: tokens.access,
            refresh: tokens.refresh.unwrap_or(refresh),
        };
        self.persist(&credentials)?;
        tracing::debug!("Access token refreshed");
        Ok(())
    }

    /// Create an account. The current session is not touched.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] if the backend refuses the registration.
    pub async fn register(&self, account: &NewAccount) -> Result<Identity, AuthError> {
        let identity = self.api.register(account).await.map_err(|e| {
            tracing::error!(error = %e, username = %account.username, "Registration failed");
            AuthError::from(e)
        })?;
        tracing::info!(username = %identity.username, role = %identity.role, "Account registered");
        Ok(identity)
    }

    /// # Errors
    ///
    /// [`AuthError::Transport`] if the backend could not send the reset mail.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.api.request_password_reset(email).await.map_err(|e| {
            tracing::error!(error = %e, "Password reset request failed");
            AuthError::from(e)
        })
    }

    /// # Errors
    ///
    /// [`AuthError::Transport`] if the reset link is invalid or expired.
    pub async fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.api
            .confirm_password_reset(uid, token, password)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password reset confirmation failed");
                AuthError::from(e)
            })
    }

    /// Start TOTP enrollment for the signed-in user.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthenticated`] without a session; [`AuthError::Transport`]
    /// if the backend refuses.
    pub async fn begin_mfa_enrollment(&self) -> Result<MfaEnrollment, AuthError> {
        let access = self.authenticated_token()?;
        self.api.mfa_setup(&access).await.map_err(|e| {
            tracing::error!(error = %e, "MFA setup failed");
            AuthError::from(e)
        })
    }

    /// Confirm TOTP enrollment with the first code from the authenticator.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthenticated`] without a session; [`AuthError::Transport`]
    /// on an invalid code.
    pub async fn confirm_mfa_enrollment(&self, code: &str) -> Result<(), AuthError> {
        let access = self.authenticated_token()?;
        self.api.mfa_confirm(&access, code).await.map_err(|e| {
            tracing::error!(error = %e, "MFA confirmation failed");
            AuthError::from(e)
        })?;
        tracing::info!("MFA enabled");
        Ok(())
    }

    /// Tear the manager down. Subscribers see the channel close; persisted
    /// tokens stay for the next start.
    pub fn dispose(self) {
        tracing::debug!("Session manager disposed");
    }

    fn begin_attempt(&self) -> Result<AttemptGuard<'_>, AuthError> {
        if self
            .login_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Rejected overlapping login attempt");
            return Err(AuthError::LoginInFlight);
        }
        Ok(AttemptGuard(&self.login_in_flight))
    }

    fn complete_login(&self, response: LoginResponse) -> Result<LoginOutcome, AuthError> {
        let (credentials, identity) = response.into_grant().map_err(|e| {
            tracing::error!(error = %e, "Login response rejected");
            AuthError::from(e)
        })?;

        self.persist(&credentials)?;

        let redirect = self.config.landing_route(identity.role).to_owned();
        self.state
            .send_modify(|session| session.authenticate(identity.clone()));
        tracing::info!(
            username = %identity.username,
            role = %identity.role,
            "Login successful"
        );

        Ok(LoginOutcome::Authenticated { identity, redirect })
    }

    fn persist(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let result = self
            .store
            .set(ACCESS_TOKEN_KEY, credentials.access.as_str())
            .and_then(|()| self.store.set(REFRESH_TOKEN_KEY, credentials.refresh.as_str()));

        if let Err(e) = result {
            tracing::error!(error = %e, "Persisting credentials failed; ending session");
            self.logout();
            return Err(AuthError::Store(e.to_string()));
        }
        Ok(())
    }

    fn stored(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.store
            .get(key)
            .map_err(|e| AuthError::Store(e.to_string()))
    }

    fn authenticated_token(&self) -> Result<AccessToken, AuthError> {
        if self.state.borrow().identity.is_none() {
            return Err(AuthError::Unauthenticated);
        }
        self.stored(ACCESS_TOKEN_KEY)?
            .map(AccessToken::from)
            .ok_or(AuthError::Unauthenticated)
    }

    fn clear_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(error = %e, key, "Failed to remove stored token");
            }
        }
    }
}
