//! Client session management for the NUAM front end.
//!
//! [`SessionManager`] owns who is signed in, the outstanding MFA challenge
//! and the persisted tokens, and moves through
//! `Restoring → {Anonymous, Authenticated}`, `Anonymous → AwaitingMfa →
//! Authenticated`, `Authenticated → Anonymous`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nuam_session::api::{ApiConfig, AuthClient};
//! use nuam_session::session::{FileTokenStore, SessionConfig, SessionManager};
//!
//! let manager = SessionManager::new(
//!     AuthClient::new(ApiConfig::from_env()?),
//!     FileTokenStore::from_env()?,
//!     SessionConfig::from_env()?,
//! );
//! manager.initialize().await;
//!
//! // Protected routes
//! match manager.guard() { /* Wait / Allow / Redirect */ }
//!
//! // Sidebar
//! let items = manager.menu(nuam_session::session::default_nav());
//! ```

mod config;
mod error;
mod guard;
mod manager;
mod menu;
mod state;
mod store;
mod traits;
mod types;

pub use config::SessionConfig;
pub use error::AuthError;
pub use guard::{RouteDecision, guard};
pub use manager::SessionManager;
pub use menu::{NavItem, default_nav, visible_items};
pub use state::{Session, SessionPhase};
pub use store::{FileTokenStore, MemoryTokenStore};
pub use traits::{AuthApi, TokenStore};
pub use types::LoginOutcome;
