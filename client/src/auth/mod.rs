//! Authentication: credential producers and the slice that applies them.
//!
//! An [`Authenticator`] turns the headers of a previous response into
//! headers to add to the next request. It is first asked with no headers at
//! all, which lets it send credentials preemptively, and once more with the
//! headers of a `401 Unauthorized` response.

mod bearer;
mod generic;
mod header;
mod slice;
mod token;

use std::sync::Arc;

use futures::future::BoxFuture;

pub use bearer::BearerAuthenticator;
pub use generic::GenericAuthenticator;
pub use header::{Authorization, Param, WwwAuthenticate};
pub use slice::AuthClientSlice;
pub use token::{OAuthTokenFormat, TokenFormat};

use crate::{error::Result, headers::Headers};

pub trait Authenticator: Send + Sync {
    /// Headers to add to a request, given the headers of the previous
    /// response (empty before the first attempt).
    fn authenticate(&self, headers: &Headers) -> BoxFuture<'static, Result<Headers>>;
}

impl<A: Authenticator + ?Sized> Authenticator for Arc<A> {
    fn authenticate(&self, headers: &Headers) -> BoxFuture<'static, Result<Headers>> {
        (**self).authenticate(headers)
    }
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn authenticate(&self, headers: &Headers) -> BoxFuture<'static, Result<Headers>> {
        (**self).authenticate(headers)
    }
}

/// Never adds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Authenticator for Anonymous {
    fn authenticate(&self, _: &Headers) -> BoxFuture<'static, Result<Headers>> {
        Box::pin(async { Ok(Headers::new()) })
    }
}

/// Adds `Authorization: Basic ...` with fixed credentials, whatever the
/// response said.
#[derive(Debug, Clone)]
pub struct BasicAuthenticator {
    credentials: Authorization,
}

impl BasicAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Authorization::basic(username, password),
        }
    }
}

impl Authenticator for BasicAuthenticator {
    fn authenticate(&self, _: &Headers) -> BoxFuture<'static, Result<Headers>> {
        let headers = Headers::from(self.credentials.clone());
        Box::pin(async move { Ok(headers) })
    }
}
