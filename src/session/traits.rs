use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::types::{
    AccessToken, Identity, LoginResponse, MfaEnrollment, NewAccount, RefreshToken, TempToken,
    TokenRefreshResponse,
};

/// Remote NUAM auth service.
///
/// [`AuthClient`](crate::api::AuthClient) is the HTTP implementation; tests and
/// alternative transports implement it directly.
pub trait AuthApi: Send + Sync + 'static {
    /// Resolve the user behind a bearer token (`GET auth/me/`).
    fn me(
        &self,
        access_token: &AccessToken,
    ) -> impl Future<Output = Result<Identity, Error>> + Send;

    /// Password login, step 1.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginResponse, Error>> + Send;

    /// One-time-code verification, step 2.
    fn verify_login(
        &self,
        temp_token: &TempToken,
        code: &str,
    ) -> impl Future<Output = Result<LoginResponse, Error>> + Send;

    fn refresh(
        &self,
        refresh_token: &RefreshToken,
    ) -> impl Future<Output = Result<TokenRefreshResponse, Error>> + Send;

    fn register(
        &self,
        account: &NewAccount,
    ) -> impl Future<Output = Result<Identity, Error>> + Send;

    fn request_password_reset(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn mfa_setup(
        &self,
        access_token: &AccessToken,
    ) -> impl Future<Output = Result<MfaEnrollment, Error>> + Send;

    fn mfa_confirm(
        &self,
        access_token: &AccessToken,
        code: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Durable key/value storage for credential tokens.
///
/// Mirrors browser local storage: string keys, string values, survives
/// restarts. The session manager is the only writer and uses the keys
/// `access_token` and `refresh_token`.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for Keychain {
///     fn get(&self, key: &str) -> Result<Option<String>, ...> {
///         Ok(self.entry(key).get_password().ok())
///     }
///     fn set(&self, key: &str, value: &str) -> Result<(), ...> {
///         self.entry(key).set_password(value)?;
///         Ok(())
///     }
///     fn remove(&self, key: &str) -> Result<(), ...> {
///         let _ = self.entry(key).delete_password();
///         Ok(())
///     }
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).remove(key)
    }
}
