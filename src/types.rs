use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::rut;

/// Account role as assigned by the backend.
///
/// Closed set: a role string the backend sends that is not listed here is a
/// decode error, not an anonymous user. `analista` and `editor` are the
/// names an earlier backend revision used for [`Role::Tributario`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "analista", alias = "editor")]
    Tributario,
    Auditor,
    Corredor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Tributario, Role::Auditor, Role::Corredor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Tributario => "tributario",
            Self::Auditor => "auditor",
            Self::Corredor => "corredor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| Error::Decode(format!("unknown role '{s}'")))
    }
}

/// The authenticated user, as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

macro_rules! secret_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "(***)"))
            }
        }
    };
}

secret_newtype!(
    /// Bearer token sent on authenticated requests.
    AccessToken
);
secret_newtype!(
    /// Long-lived token exchanged for a new [`AccessToken`].
    RefreshToken
);
secret_newtype!(
    /// Short-lived token binding login step 1 (password) to step 2 (code).
    TempToken
);

/// Access/refresh pair issued on a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Outstanding second-factor challenge between the two login steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaChallenge {
    pub temp_token: TempToken,
}

/// Body of `POST auth/login/` and `POST auth/login/verify/`.
///
/// Either a challenge (`mfa_required` + `temp_token`) or a grant
/// (`access` + `refresh` + `user`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LoginResponse {
    #[serde(default)]
    pub mfa_required: bool,
    #[serde(default)]
    pub temp_token: Option<TempToken>,
    #[serde(default)]
    pub access: Option<AccessToken>,
    #[serde(default)]
    pub refresh: Option<RefreshToken>,
    #[serde(default)]
    pub user: Option<Identity>,
}

impl LoginResponse {
    /// A response asking for a one-time code.
    #[must_use]
    pub fn challenge(temp_token: impl Into<TempToken>) -> Self {
        Self {
            mfa_required: true,
            temp_token: Some(temp_token.into()),
            ..Self::default()
        }
    }

    /// A response granting a session.
    #[must_use]
    pub fn grant(
        access: impl Into<AccessToken>,
        refresh: impl Into<RefreshToken>,
        user: Option<Identity>,
    ) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
            user,
            ..Self::default()
        }
    }

    /// Extract the second-factor challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `mfa_required` is set without a `temp_token`.
    pub fn into_challenge(self) -> Result<MfaChallenge, Error> {
        self.temp_token
            .map(|temp_token| MfaChallenge { temp_token })
            .ok_or_else(|| Error::Decode("mfa_required without temp_token".into()))
    }

    /// Extract credentials and identity from a granting response.
    ///
    /// No identity is assumed: a grant without `user` is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTokens`] or [`Error::MissingIdentity`].
    pub fn into_grant(self) -> Result<(Credentials, Identity), Error> {
        let (Some(access), Some(refresh)) = (self.access, self.refresh) else {
            return Err(Error::MissingTokens);
        };
        let identity = self.user.ok_or(Error::MissingIdentity)?;
        Ok((Credentials { access, refresh }, identity))
    }
}

/// Body of `POST token/refresh/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TokenRefreshResponse {
    pub access: AccessToken,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<RefreshToken>,
}

impl TokenRefreshResponse {
    #[must_use]
    pub fn new(access: impl Into<AccessToken>, refresh: Option<RefreshToken>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

/// Self-service account registration (`POST auth/register/`).
#[derive(Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// TOTP enrollment material from `GET mfa/setup/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MfaEnrollment {
    /// `data:image/png;base64,...` URI of the provisioning QR code.
    pub qr_code: String,
    /// Shared secret for manual entry into an authenticator app.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl MfaEnrollment {
    #[must_use]
    pub fn new(qr_code: impl Into<String>, secret_key: Option<String>) -> Self {
        Self {
            qr_code: qr_code.into(),
            secret_key,
        }
    }

    /// Decode the PNG bytes embedded in [`qr_code`](Self::qr_code).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the URI is not a base64 PNG data URI.
    pub fn qr_png(&self) -> Result<Vec<u8>, Error> {
        let payload = self
            .qr_code
            .strip_prefix("data:image/png;base64,")
            .ok_or_else(|| Error::Decode("qr_code is not a PNG data URI".into()))?;
        STANDARD
            .decode(payload)
            .map_err(|e| Error::Decode(format!("qr_code: {e}")))
    }
}

/// Validated Chilean RUT, stored in canonical compact form (`123456785`).
///
/// Holding a `Rut` proves the check digit matched. `Display` renders the
/// grouped form (`12.345.678-5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut(String);

impl Rut {
    /// Canonical compact form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits before the check character.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.0[..self.0.len() - 1]
    }

    #[must_use]
    pub fn check_digit(&self) -> char {
        self.0.chars().last().unwrap_or('0')
    }
}

impl std::fmt::Display for Rut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&rut::format(&self.0))
    }
}

impl std::str::FromStr for Rut {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Rut {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if rut::validate(&s) {
            Ok(Self(rut::clean(&s)))
        } else {
            Err(Error::InvalidRut(s))
        }
    }
}

impl From<Rut> for String {
    fn from(r: Rut) -> Self {
        r.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        let role: Role = serde_json::from_str("\"corredor\"").unwrap();
        assert_eq!(role, Role::Corredor);
        assert_eq!(serde_json::to_string(&Role::Tributario).unwrap(), "\"tributario\"");
    }

    #[test]
    fn legacy_role_names_map_to_tributario() {
        assert_eq!("analista".parse::<Role>().unwrap(), Role::Tributario);
        assert_eq!("editor".parse::<Role>().unwrap(), Role::Tributario);
    }

    #[test]
    fn unknown_role_is_an_error() {
        assert!("superuser".parse::<Role>().is_err());
        assert!(serde_json::from_str::<Identity>(r#"{"username":"x","role":"root"}"#).is_err());
    }

    #[test]
    fn identity_ignores_extra_fields() {
        let identity: Identity = serde_json::from_str(
            r#"{"username":"alice","role":"auditor","email":"a@example.cl","id":7}"#,
        )
        .unwrap();
        assert_eq!(identity, Identity::new("alice", Role::Auditor));
    }

    #[test]
    fn tokens_are_redacted_in_debug() {
        let token = AccessToken::from("eyJhbGciOi.secret");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        let account = NewAccount {
            username: "bob".into(),
            email: None,
            password: "hunter2".into(),
            role: Role::Tributario,
        };
        assert!(!format!("{account:?}").contains("hunter2"));
    }

    #[test]
    fn login_response_challenge() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"mfa_required":true,"temp_token":"T"}"#).unwrap();
        assert!(response.mfa_required);
        let challenge = response.into_challenge().unwrap();
        assert_eq!(challenge.temp_token.as_str(), "T");
    }

    #[test]
    fn login_response_grant() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"mfa_required":false,"access":"a","refresh":"r","user":{"username":"alice","role":"admin"}}"#,
        )
        .unwrap();
        let (credentials, identity) = response.into_grant().unwrap();
        assert_eq!(credentials.access.as_str(), "a");
        assert_eq!(credentials.refresh.as_str(), "r");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn grant_without_user_fails_closed() {
        let response = LoginResponse::grant("a", "r", None);
        assert!(matches!(response.into_grant(), Err(Error::MissingIdentity)));
    }

    #[test]
    fn grant_without_tokens_fails() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"user":{"username":"alice","role":"admin"}}"#).unwrap();
        assert!(matches!(response.into_grant(), Err(Error::MissingTokens)));
    }

    #[test]
    fn challenge_without_temp_token_fails() {
        let response: LoginResponse = serde_json::from_str(r#"{"mfa_required":true}"#).unwrap();
        assert!(matches!(response.into_challenge(), Err(Error::Decode(_))));
    }

    #[test]
    fn qr_png_decodes_data_uri() {
        let enrollment = MfaEnrollment::new("data:image/png;base64,iVBORw0KGgo=", None);
        assert_eq!(enrollment.qr_png().unwrap(), b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn qr_png_rejects_other_uris() {
        let enrollment = MfaEnrollment::new("otpauth://totp/nuam:alice", None);
        assert!(enrollment.qr_png().is_err());
    }

    #[test]
    fn rut_parses_to_canonical_form() {
        let rut: Rut = "12.345.678-5".parse().unwrap();
        assert_eq!(rut.as_str(), "123456785");
        assert_eq!(rut.body(), "12345678");
        assert_eq!(rut.check_digit(), '5');
        assert_eq!(rut.to_string(), "12.345.678-5");
    }

    #[test]
    fn rut_rejects_bad_check_digit() {
        assert!(matches!("12345678-9".parse::<Rut>(), Err(Error::InvalidRut(_))));
        assert!("".parse::<Rut>().is_err());
    }

    #[test]
    fn rut_serde_uses_canonical_string() {
        let rut: Rut = "6-k".parse().unwrap();
        assert_eq!(serde_json::to_string(&rut).unwrap(), "\"6K\"");
        let parsed: Rut = serde_json::from_str("\"30.686.957-4\"").unwrap();
        assert_eq!(parsed.as_str(), "306869574");
        assert!(serde_json::from_str::<Rut>("\"30.686.957-5\"").is_err());
    }
}
