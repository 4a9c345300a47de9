use super::state::Session;

/// What a protected route should do for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Restore still running: render a neutral placeholder, do not redirect.
    Wait,
    /// Render the protected content.
    Allow,
    /// Send the user to this route (the login page).
    Redirect(String),
}

/// Protected-route check.
///
/// ```rust
/// use nuam_session::session::{MemoryTokenStore, RouteDecision, SessionManager};
/// # fn check<A: nuam_session::session::AuthApi>(manager: &SessionManager<A, MemoryTokenStore>) {
/// match manager.guard() {
///     RouteDecision::Wait => { /* spinner */ }
///     RouteDecision::Allow => { /* page */ }
///     RouteDecision::Redirect(_to) => { /* navigate(to) */ }
/// }
/// # }
/// ```
#[must_use]
pub fn guard(session: &Session, login_route: &str) -> RouteDecision {
    if session.is_loading() {
        RouteDecision::Wait
    } else if session.identity().is_some() {
        RouteDecision::Allow
    } else {
        RouteDecision::Redirect(login_route.to_owned())
    }
}
