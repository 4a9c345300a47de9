use std::env::{self, VarError};

use super::error::AuthError;
use crate::types::Role;

/// Navigation targets the session manager hands back to the view layer.
///
/// Defaults match the NUAM front end routes. Override with `with_*` methods.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) login_route: String,
    pub(crate) dashboard_route: String,
    pub(crate) broker_dashboard_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_route: "/login".into(),
            dashboard_route: "/dashboard".into(),
            broker_dashboard_route: "/corredor/dashboard".into(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `NUAM_LOGIN_ROUTE`: where logout and the route guard send users
    /// - `NUAM_DASHBOARD_ROUTE`: landing route after login
    /// - `NUAM_BROKER_DASHBOARD_ROUTE`: landing route after login for brokers
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a route is set but not an absolute path.
    pub fn from_env() -> Result<Self, AuthError> {
        let mut config = Self::default();

        if let Some(route) = route_var("NUAM_LOGIN_ROUTE")? {
            config = config.with_login_route(route);
        }
        if let Some(route) = route_var("NUAM_DASHBOARD_ROUTE")? {
            config = config.with_dashboard_route(route);
        }
        if let Some(route) = route_var("NUAM_BROKER_DASHBOARD_ROUTE")? {
            config = config.with_broker_dashboard_route(route);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    #[must_use]
    pub fn with_dashboard_route(mut self, route: impl Into<String>) -> Self {
        self.dashboard_route = route.into();
        self
    }

    #[must_use]
    pub fn with_broker_dashboard_route(mut self, route: impl Into<String>) -> Self {
        self.broker_dashboard_route = route.into();
        self
    }

    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Route to open after a completed login.
    ///
    /// Brokers (`corredor`) get their own dashboard; every other role lands
    /// on the general one.
    #[must_use]
    pub fn landing_route(&self, role: Role) -> &str {
        match role {
            Role::Corredor => &self.broker_dashboard_route,
            Role::Admin | Role::Tributario | Role::Auditor => &self.dashboard_route,
        }
    }
}

fn route_var(name: &str) -> Result<Option<String>, AuthError> {
    parse_route(name, env::var(name))
}

fn parse_route(name: &str, value: Result<String, VarError>) -> Result<Option<String>, AuthError> {
    match value {
        Ok(route) if route.starts_with('/') => Ok(Some(route)),
        Ok(route) => Err(AuthError::Config(format!(
            "{name} must be an absolute path, got '{route}'"
        ))),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AuthError::Config(format!("{name} is not valid UTF-8"))),
    }
}
