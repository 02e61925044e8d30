//! Bearer attachment and sign-out signalling
//!
//! The pagination core must not tear down sessions itself. When the upstream
//! rejects a credential it calls a [`SignOutHook`] and the surrounding
//! application decides what that means (clear cookies, redirect, exit).

use super::types::Credential;
use reqwest::RequestBuilder;

/// Zero-argument callback invoked when the upstream rejects the credential
pub trait SignOutHook: Send + Sync {
    /// Request a global sign-out
    fn sign_out(&self);
}

impl<F> SignOutHook for F
where
    F: Fn() + Send + Sync,
{
    fn sign_out(&self) {
        self();
    }
}

/// Hook that ignores sign-out requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSignOut;

impl SignOutHook for NoopSignOut {
    fn sign_out(&self) {
        tracing::debug!("Sign-out requested but no hook is installed");
    }
}

/// Attach `Authorization: Bearer <token>` to a request
pub fn apply_bearer(req: RequestBuilder, credential: &Credential) -> RequestBuilder {
    req.bearer_auth(credential.token())
}
