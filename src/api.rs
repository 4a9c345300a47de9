use std::env::{self, VarError};

use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::session::{AuthApi, AuthError};
use crate::types::{
    AccessToken, Identity, LoginResponse, MfaEnrollment, NewAccount, RefreshToken, TempToken,
    TokenRefreshResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";

/// NUAM auth service endpoints.
///
/// Every endpoint is derived from a single base URL; individual endpoints can
/// be overridden afterwards.
///
/// ```rust,ignore
/// use nuam_session::api::ApiConfig;
///
/// let config = ApiConfig::new("https://nuam.example.cl/api".parse()?)?
///     .with_refresh_url("https://sso.example.cl/token/refresh/".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) me_url: Url,
    pub(crate) login_url: Url,
    pub(crate) login_verify_url: Url,
    pub(crate) refresh_url: Url,
    pub(crate) register_url: Url,
    pub(crate) password_reset_url: Url,
    pub(crate) password_reset_confirm_url: Url,
    pub(crate) mfa_setup_url: Url,
    pub(crate) mfa_verify_url: Url,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.parse().expect("valid default URL"))
            .expect("valid default URL")
    }
}

impl ApiConfig {
    /// Derive all endpoints from `base_url` (e.g. `https://host/api/`).
    ///
    /// A missing trailing slash is added so the last path segment is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` cannot be used as a base.
    pub fn new(mut base_url: Url) -> Result<Self, Error> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            me_url: base_url.join("auth/me/")?,
            login_url: base_url.join("auth/login/")?,
            login_verify_url: base_url.join("auth/login/verify/")?,
            refresh_url: base_url.join("token/refresh/")?,
            register_url: base_url.join("auth/register/")?,
            password_reset_url: base_url.join("auth/password-reset/")?,
            password_reset_confirm_url: base_url.join("auth/password-reset/confirm/")?,
            mfa_setup_url: base_url.join("mfa/setup/")?,
            mfa_verify_url: base_url.join("mfa/verify/")?,
        })
    }

    /// Create config from the environment.
    ///
    /// # Optional env vars
    /// - `NUAM_API_URL`: API base URL (default `http://localhost:8000/api/`)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `NUAM_API_URL` is not valid UTF-8 or
    /// not a usable base URL.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_base_var(env::var("NUAM_API_URL"))
    }

    fn from_base_var(value: Result<String, VarError>) -> Result<Self, AuthError> {
        match value {
            Ok(url_str) => {
                let url: Url = url_str
                    .parse()
                    .map_err(|e| AuthError::Config(format!("NUAM_API_URL: {e}")))?;
                Self::new(url).map_err(|e| AuthError::Config(format!("NUAM_API_URL: {e}")))
            }
            Err(VarError::NotPresent) => Ok(Self::default()),
            Err(VarError::NotUnicode(_)) => Err(AuthError::Config(
                "NUAM_API_URL is not valid UTF-8".into(),
            )),
        }
    }

    /// Override the identity resolution endpoint.
    #[must_use]
    pub fn with_me_url(mut self, url: Url) -> Self {
        self.me_url = url;
        self
    }

    /// Override the password login endpoint.
    #[must_use]
    pub fn with_login_url(mut self, url: Url) -> Self {
        self.login_url = url;
        self
    }

    /// Override the one-time-code verification endpoint.
    #[must_use]
    pub fn with_login_verify_url(mut self, url: Url) -> Self {
        self.login_verify_url = url;
        self
    }

    /// Override the token refresh endpoint.
    #[must_use]
    pub fn with_refresh_url(mut self, url: Url) -> Self {
        self.refresh_url = url;
        self
    }

    #[must_use]
    pub fn with_register_url(mut self, url: Url) -> Self {
        self.register_url = url;
        self
    }

    #[must_use]
    pub fn with_password_reset_url(mut self, url: Url) -> Self {
        self.password_reset_url = url;
        self
    }

    #[must_use]
    pub fn with_password_reset_confirm_url(mut self, url: Url) -> Self {
        self.password_reset_confirm_url = url;
        self
    }

    #[must_use]
    pub fn with_mfa_setup_url(mut self, url: Url) -> Self {
        self.mfa_setup_url = url;
        self
    }

    #[must_use]
    pub fn with_mfa_verify_url(mut self, url: Url) -> Self {
        self.mfa_verify_url = url;
        self
    }

    #[must_use]
    pub fn me_url(&self) -> &Url {
        &self.me_url
    }

    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    #[must_use]
    pub fn login_verify_url(&self) -> &Url {
        &self.login_verify_url
    }

    #[must_use]
    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }
}

/// HTTP client for the NUAM auth service.
pub struct AuthClient {
    config: ApiConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    temp_token: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Serialize)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct PasswordResetConfirm<'a> {
    uid: &'a str,
    token: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CodeRequest<'a> {
    code: &'a str,
}

#[derive(serde::Deserialize)]
struct RegisterResponse {
    user: Identity,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse, timeouts or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Resolve the user behind an access token (`GET auth/me/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or an undecodable body, and
    /// [`Error::Api`] if the server rejects the token.
    pub async fn me(&self, access_token: &AccessToken) -> Result<Identity, Error> {
        let response = self
            .http
            .get(self.config.me_url.clone())
            .bearer_auth(access_token.as_str())
            .send()
            .await?;

        let response = Self::ensure_success(response, "identity resolution").await?;
        response.json::<Identity>().await.map_err(Into::into)
    }

    /// Password login, step 1 (`POST auth/login/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the credentials are rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, Error> {
        let response = self
            .http
            .post(self.config.login_url.clone())
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = Self::ensure_success(response, "login").await?;
        response.json::<LoginResponse>().await.map_err(Into::into)
    }

    /// One-time-code verification, step 2 (`POST auth/login/verify/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the code or `temp_token` is invalid or expired.
    pub async fn verify_login(
        &self,
        temp_token: &TempToken,
        code: &str,
    ) -> Result<LoginResponse, Error> {
        let response = self
            .http
            .post(self.config.login_verify_url.clone())
            .json(&VerifyRequest {
                temp_token: temp_token.as_str(),
                code,
            })
            .send()
            .await?;

        let response = Self::ensure_success(response, "login verification").await?;
        response.json::<LoginResponse>().await.map_err(Into::into)
    }

    /// Exchange a refresh token for a new access token (`POST token/refresh/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the refresh token is expired or blacklisted.
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenRefreshResponse, Error> {
        let response = self
            .http
            .post(self.config.refresh_url.clone())
            .json(&RefreshRequest {
                refresh: refresh_token.as_str(),
            })
            .send()
            .await?;

        let response = Self::ensure_success(response, "token refresh").await?;
        response.json::<TokenRefreshResponse>().await.map_err(Into::into)
    }

    /// Create an account (`POST auth/register/`). Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the username is taken or fields are missing.
    pub async fn register(&self, account: &NewAccount) -> Result<Identity, Error> {
        let response = self
            .http
            .post(self.config.register_url.clone())
            .json(account)
            .send()
            .await?;

        let response = Self::ensure_success(response, "registration").await?;
        let body = response.json::<RegisterResponse>().await?;
        Ok(body.user)
    }

    /// Ask the backend to mail a password reset link (`POST auth/password-reset/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the backend could not send the mail.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.config.password_reset_url.clone())
            .json(&PasswordResetRequest { email })
            .send()
            .await?;

        Self::ensure_success(response, "password reset request").await?;
        Ok(())
    }

    /// Set a new password from a reset link (`POST auth/password-reset/confirm/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the link is invalid or expired.
    pub async fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        password: &str,
    ) -> Result<(), Error> {
        let response = self
            .http
            .post(self.config.password_reset_confirm_url.clone())
            .json(&PasswordResetConfirm {
                uid,
                token,
                password,
            })
            .send()
            .await?;

        Self::ensure_success(response, "password reset confirmation").await?;
        Ok(())
    }

    /// Start TOTP enrollment for the signed-in user (`GET mfa/setup/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the access token is rejected.
    pub async fn mfa_setup(&self, access_token: &AccessToken) -> Result<MfaEnrollment, Error> {
        let response = self
            .http
            .get(self.config.mfa_setup_url.clone())
            .bearer_auth(access_token.as_str())
            .send()
            .await?;

        let response = Self::ensure_success(response, "MFA setup").await?;
        response.json::<MfaEnrollment>().await.map_err(Into::into)
    }

    /// Confirm TOTP enrollment with a first code (`POST mfa/verify/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] on an invalid code or when no enrollment is pending.
    pub async fn mfa_confirm(&self, access_token: &AccessToken, code: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.config.mfa_verify_url.clone())
            .bearer_auth(access_token.as_str())
            .json(&CodeRequest { code })
            .send()
            .await?;

        Self::ensure_success(response, "MFA confirmation").await?;
        Ok(())
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl AuthApi for AuthClient {
    async fn me(&self, access_token: &AccessToken) -> Result<Identity, Error> {
        AuthClient::me(self, access_token).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, Error> {
        AuthClient::login(self, username, password).await
    }

    async fn verify_login(&self, temp_token: &TempToken, code: &str) -> Result<LoginResponse, Error> {
        AuthClient::verify_login(self, temp_token, code).await
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenRefreshResponse, Error> {
        AuthClient::refresh(self, refresh_token).await
    }

    async fn register(&self, account: &NewAccount) -> Result<Identity, Error> {
        AuthClient::register(self, account).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        AuthClient::request_password_reset(self, email).await
    }

    async fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        password: &str,
    ) -> Result<(), Error> {
        AuthClient::confirm_password_reset(self, uid, token, password).await
    }

    async fn mfa_setup(&self, access_token: &AccessToken) -> Result<MfaEnrollment, Error> {
        AuthClient::mfa_setup(self, access_token).await
    }

    async fn mfa_confirm(&self, access_token: &AccessToken, code: &str) -> Result<(), Error> {
        AuthClient::mfa_confirm(self, access_token, code).await
    }
}
