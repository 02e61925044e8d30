//! Authentication module
//!
//! The relay never issues or refreshes tokens. It carries a bearer
//! [`Credential`] obtained elsewhere, attaches it to outbound requests, and
//! reports upstream rejection through a [`SignOutHook`].

mod session;
mod types;

pub use session::{apply_bearer, NoopSignOut, SignOutHook};
pub use types::{Credential, TOKEN_ENV_VAR};
