#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod api;
pub mod error;
pub mod rut;
pub mod session;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use api::{ApiConfig, AuthClient};
pub use error::Error;
pub use rut::{clean as clean_rut, format as format_rut, validate as validate_rut};
pub use session::{AuthError, LoginOutcome, SessionConfig, SessionManager};
pub use types::{Identity, MfaChallenge, MfaEnrollment, Role, Rut};
